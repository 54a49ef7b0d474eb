use crate::error::{Error, Result};
use hexfile::Program;
use std::path::Path;
use vcpu16::memory::checked_write;
use vcpu16::Memory;

/// Writes a HEX program's data records at their fixed addresses, then its
/// instructions into the first contiguous empty region large enough to
/// hold them. Returns that region's starting address, which the caller
/// sets `PC` to before starting the core.
pub fn load(memory: &mut Memory, program: &Program) -> Result<u16> {
    for record in &program.data {
        let mut address = record.address;
        for &byte in &record.bytes {
            checked_write(memory, address, byte);
            address = address.wrapping_add(1);
        }
    }

    let slot = memory
        .find_empty_slot(program.instructions.len())
        .ok_or_else(|| Error::LoadFailure {
            path: Path::new("<loaded program>").to_owned(),
            reason: "no contiguous empty region large enough for the program".into(),
        })?;

    for (offset, word) in program.instructions.iter().enumerate() {
        memory.write_word(slot.wrapping_add(offset as u16), *word);
    }

    Ok(slot)
}

pub fn load_file<P: AsRef<Path>>(memory: &mut Memory, path: P) -> Result<u16> {
    let path = path.as_ref();
    let program = hexfile::read_file(path).map_err(|source| Error::LoadFailure {
        path: path.to_owned(),
        reason: source.to_string(),
    })?;
    load(memory, &program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexfile::{DataRecord, Program};

    #[test]
    fn instructions_land_in_first_empty_slot() {
        let mut memory = Memory::new();
        let program = Program::new(vec![0x1005, 0x2010], vec![]);
        let slot = load(&mut memory, &program).unwrap();
        assert_eq!(slot, 0);
        assert_eq!(memory.read_word(0), 0x1005);
        assert_eq!(memory.read_word(1), 0x2010);
    }

    #[test]
    fn data_records_write_at_their_fixed_address() {
        let mut memory = Memory::new();
        let program = Program::new(
            vec![],
            vec![DataRecord {
                address: 0xAD,
                bytes: vec![b'h', b'i'],
            }],
        );
        load(&mut memory, &program).unwrap();
        assert_eq!(memory.read_byte(0xAD), b'h');
        assert_eq!(memory.read_byte(0xAE), b'i');
    }

    #[test]
    fn instructions_skip_over_occupied_data_cells() {
        let mut memory = Memory::new();
        let program = Program::new(
            vec![0x1005],
            vec![DataRecord {
                address: 0,
                bytes: vec![1],
            }],
        );
        let slot = load(&mut memory, &program).unwrap();
        assert_eq!(slot, 1);
    }
}
