/// Condition flags updated by `add`, `sub` and `cmp`, plus the halt gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub zero: bool,
    pub overflow: bool,
    pub carry: bool,
    /// Set by `syscall 0` (`EXIT`). Once set, the CPU stops ticking.
    pub halted: bool,
}

impl Flags {
    pub fn new() -> Flags {
        Flags::default()
    }

    pub fn set_arith(&mut self, result: u8, carry: bool, overflow: bool) {
        self.zero = result == 0;
        self.carry = carry;
        self.overflow = overflow;
    }
}
