use std::io::{Read, Write};

use anyhow::{anyhow, Result};

use crate::symbol::ScriptInfo;
use crate::types::{Position, PrimitiveType, Range, Type};

use super::io::{CacheReader, CacheWriter};

/// An error remembered for a cached file, with the range it decorates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedError {
    pub range: Range,
    pub message: String,
}

impl CachedError {
    pub fn new(range: Range, message: impl Into<String>) -> Self {
        Self {
            range,
            message: message.into(),
        }
    }

    fn write<W: Write>(&self, writer: &mut CacheWriter<W>) -> Result<()> {
        writer.write_i32(self.range.start.line)?;
        writer.write_i32(self.range.start.column)?;
        writer.write_i32(self.range.end.line)?;
        writer.write_i32(self.range.end.column)?;
        writer.write_utf(&self.message)
    }

    fn read<R: Read>(reader: &mut CacheReader<R>) -> Result<Self> {
        let start = Position::new(reader.read_i32()?, reader.read_i32()?);
        let end = Position::new(reader.read_i32()?, reader.read_i32()?);
        let message = reader.read_utf()?;
        Ok(Self {
            range: Range::new(start, end),
            message,
        })
    }
}

/// The cached state of one source file: its identity, the checksum of the
/// bytes last compiled, the declarations it produced and its errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachedFile {
    /// Source-root relative directory path, empty for the root itself.
    pub path: String,
    /// File name within `path`.
    pub name: String,
    /// CRC32 of the bytes last successfully compiled.
    pub crc: u32,
    pub scripts: Vec<ScriptInfo>,
    pub errors: Vec<CachedError>,
}

impl CachedFile {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Rebuild a cached file identity from a forward-slash key.
    pub fn from_key(key: &str) -> Self {
        match key.rsplit_once('/') {
            Some((path, name)) => Self::new(path, name),
            None => Self::new("", key),
        }
    }

    /// The forward-slash key of this file below the source root.
    pub fn full_path(&self) -> String {
        if self.path.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.path, self.name)
        }
    }

    pub fn write<W: Write>(&self, writer: &mut CacheWriter<W>) -> Result<()> {
        writer.write_utf(&self.full_path())?;
        writer.write_u32(self.crc)?;
        writer.write_u16(self.scripts.len() as u16)?;
        for script in &self.scripts {
            write_script_info(writer, script)?;
        }
        writer.write_u16(self.errors.len() as u16)?;
        for error in &self.errors {
            error.write(writer)?;
        }
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut CacheReader<R>) -> Result<Self> {
        let mut file = Self::from_key(&reader.read_utf()?);
        file.crc = reader.read_u32()?;
        let script_count = reader.read_u16()?;
        for _ in 0..script_count {
            file.scripts.push(read_script_info(reader)?);
        }
        let error_count = reader.read_u16()?;
        for _ in 0..error_count {
            file.errors.push(CachedError::read(reader)?);
        }
        Ok(file)
    }
}

fn write_script_info<W: Write>(writer: &mut CacheWriter<W>, info: &ScriptInfo) -> Result<()> {
    writer.write_utf(&info.trigger)?;
    writer.write_utf(&info.name)?;
    writer.write_u8(info.arguments.len() as u8)?;
    for ty in &info.arguments {
        writer.write_u8(ty.tag())?;
    }
    let returns = info.returns.flattened();
    writer.write_u8(returns.len() as u8)?;
    for ty in returns {
        writer.write_u8(ty.tag())?;
    }
    Ok(())
}

fn read_script_info<R: Read>(reader: &mut CacheReader<R>) -> Result<ScriptInfo> {
    let trigger = reader.read_utf()?;
    let name = reader.read_utf()?;
    let argument_count = reader.read_u8()?;
    let mut arguments = Vec::with_capacity(argument_count as usize);
    for _ in 0..argument_count {
        arguments.push(read_type_tag(reader)?);
    }
    let return_count = reader.read_u8()?;
    let mut returns = Vec::with_capacity(return_count as usize);
    for _ in 0..return_count {
        returns.push(read_type_tag(reader)?);
    }
    Ok(ScriptInfo::new(
        trigger,
        name,
        arguments,
        Type::from_flattened(returns),
    ))
}

fn read_type_tag<R: Read>(reader: &mut CacheReader<R>) -> Result<PrimitiveType> {
    let tag = reader.read_u8()?;
    PrimitiveType::from_tag(tag).ok_or_else(|| anyhow!("unknown primitive type tag {}", tag))
}
