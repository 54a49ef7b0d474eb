//! Reads and writes the Intel-HEX subset used to move a vcpu16 program
//! between the assembler and the emulator: a type `00` data record per
//! label, one or more type `11` program records, and a type `01` EOF
//! record. No checksum is generated on write; a checksum byte, if present,
//! is accepted and ignored on read.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

/// Bytes of payload packed into a single type-11 program record (8
/// instruction words).
pub const WORDS_PER_RECORD: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("malformed HEX record: {0}")]
    Malformed(String),

    #[error("HEX record has odd-length payload: {0} hex digits")]
    OddLength(usize),

    #[error("record missing leading ':'")]
    MissingColon,
}

pub type Result<T> = std::result::Result<T, Error>;

/// A parsed assembler output: the instruction words destined for a program
/// record, and the data-label layout destined for one data record per
/// label.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    pub instructions: Vec<u16>,
    pub data: Vec<DataRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRecord {
    pub address: u16,
    pub bytes: Vec<u8>,
}

impl Program {
    pub fn new(instructions: Vec<u16>, data: Vec<DataRecord>) -> Program {
        Program { instructions, data }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Data,
    Eof,
    Program,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub address: u16,
    pub kind: RecordKind,
    pub payload: Vec<u8>,
}

fn hex_byte(s: &[u8]) -> Result<u8> {
    let text =
        std::str::from_utf8(s).map_err(|_| Error::Malformed("non-ASCII in record".into()))?;
    u8::from_str_radix(text, 16).map_err(|_| Error::Malformed(format!("bad hex byte {:?}", text)))
}

/// Parses one Intel-HEX line (no trailing newline) into a `Record`.
pub fn parse_record(line: &str) -> Result<Record> {
    let line = line.trim();
    let rest = line
        .strip_prefix(':')
        .ok_or(Error::MissingColon)?
        .as_bytes();

    if rest.len() % 2 != 0 {
        return Err(Error::OddLength(rest.len()));
    }

    let bytes: Result<Vec<u8>> = rest.chunks(2).map(hex_byte).collect();
    let bytes = bytes?;

    if bytes.len() < 4 {
        return Err(Error::Malformed("record shorter than header".into()));
    }

    let byte_count = bytes[0] as usize;
    let address = ((bytes[1] as u16) << 8) | bytes[2] as u16;
    let record_type = bytes[3];

    let payload_end = 4 + byte_count;
    let payload = bytes
        .get(4..payload_end)
        .ok_or_else(|| Error::Malformed("payload shorter than byte count".into()))?
        .to_vec();

    let kind = match record_type {
        0x00 => RecordKind::Data,
        0x01 => RecordKind::Eof,
        0x11 => RecordKind::Program,
        other => return Err(Error::Malformed(format!("unknown record type 0x{:02X}", other))),
    };

    Ok(Record {
        address,
        kind,
        payload,
    })
}

fn format_record(address: u16, record_type: u8, payload: &[u8]) -> String {
    let mut out = String::with_capacity(11 + payload.len() * 2);
    out.push(':');
    out.push_str(&format!("{:02X}", payload.len()));
    out.push_str(&format!("{:04X}", address));
    out.push_str(&format!("{:02X}", record_type));
    for byte in payload {
        out.push_str(&format!("{:02X}", byte));
    }
    out
}

/// Serializes a `Program` into the ordered sequence of HEX lines: one
/// type-11 record per `WORDS_PER_RECORD` instruction words, then one
/// type-00 record per data label, then the EOF record.
pub fn write<W: Write>(writer: &mut W, program: &Program) -> std::io::Result<()> {
    for (chunk_index, chunk) in program.instructions.chunks(WORDS_PER_RECORD).enumerate() {
        let mut payload = Vec::with_capacity(chunk.len() * 2);
        for word in chunk {
            payload.write_u16::<BigEndian>(*word)?;
        }
        let address = (chunk_index * WORDS_PER_RECORD) as u16;
        writeln!(writer, "{}", format_record(address, 0x11, &payload))?;
    }

    for record in &program.data {
        writeln!(writer, "{}", format_record(record.address, 0x00, &record.bytes))?;
    }

    writeln!(writer, "{}", format_record(0, 0x01, &[]))?;
    Ok(())
}

/// Parses a full HEX file into its program words and data records. Stops
/// at the first EOF record; lines after it are ignored.
pub fn read<R: Read>(reader: &mut R) -> std::io::Result<Program> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let mut instructions: Vec<(u16, u16)> = Vec::new();
    let mut data = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let record = parse_record(line)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string()))?;

        match record.kind {
            RecordKind::Eof => break,
            RecordKind::Data => data.push(DataRecord {
                address: record.address,
                bytes: record.payload,
            }),
            RecordKind::Program => {
                for (i, word) in record.payload.chunks(2).enumerate() {
                    if word.len() < 2 {
                        continue;
                    }
                    let value = ((word[0] as u16) << 8) | word[1] as u16;
                    instructions.push((record.address + i as u16, value));
                }
            }
        }
    }

    instructions.sort_by_key(|(address, _)| *address);
    let instructions = instructions.into_iter().map(|(_, word)| word).collect();

    Ok(Program::new(instructions, data))
}

pub trait ReadHexExt: Read + Sized {
    fn read_hex(&mut self) -> std::io::Result<Program> {
        read(self)
    }
}

impl<R: Read + Sized> ReadHexExt for R {}

pub trait WriteHexExt: Write + Sized {
    fn write_hex(&mut self, program: &Program) -> std::io::Result<()> {
        write(self, program)
    }
}

impl<W: Write + Sized> WriteHexExt for W {}

pub fn read_file<P: AsRef<Path>>(path: P) -> std::io::Result<Program> {
    BufReader::new(File::open(path)?).read_hex()
}

pub fn write_file<P: AsRef<Path>>(path: P, program: &Program) -> std::io::Result<()> {
    BufWriter::new(File::create(path)?).write_hex(program)
}
