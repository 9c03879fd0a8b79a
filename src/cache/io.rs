use std::io::{Read, Write};

use anyhow::{anyhow, Context, Result};

/// Big-endian binary writer for the cache format.
pub struct CacheWriter<W: Write> {
    inner: W,
}

impl<W: Write> CacheWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.inner.write_all(&[value]).context("writing u8")
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.inner
            .write_all(&value.to_be_bytes())
            .context("writing u16")
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.inner
            .write_all(&value.to_be_bytes())
            .context("writing u32")
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.inner
            .write_all(&value.to_be_bytes())
            .context("writing i32")
    }

    /// Write a 2-byte length-prefixed UTF-8 string.
    pub fn write_utf(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() > u16::MAX as usize {
            return Err(anyhow!("string of {} bytes is too long to encode", bytes.len()));
        }
        self.write_u16(bytes.len() as u16)?;
        self.inner.write_all(bytes).context("writing utf bytes")
    }
}

/// Big-endian binary reader for the cache format.
pub struct CacheReader<R: Read> {
    inner: R,
}

impl<R: Read> CacheReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut buffer = [0u8; 1];
        self.inner.read_exact(&mut buffer).context("reading u8")?;
        Ok(buffer[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let mut buffer = [0u8; 2];
        self.inner.read_exact(&mut buffer).context("reading u16")?;
        Ok(u16::from_be_bytes(buffer))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buffer = [0u8; 4];
        self.inner.read_exact(&mut buffer).context("reading u32")?;
        Ok(u32::from_be_bytes(buffer))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let mut buffer = [0u8; 4];
        self.inner.read_exact(&mut buffer).context("reading i32")?;
        Ok(i32::from_be_bytes(buffer))
    }

    /// Read a 2-byte length-prefixed UTF-8 string.
    pub fn read_utf(&mut self) -> Result<String> {
        let length = self.read_u16()? as usize;
        let mut buffer = vec![0u8; length];
        self.inner
            .read_exact(&mut buffer)
            .context("reading utf bytes")?;
        String::from_utf8(buffer).context("decoding utf string")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_round_trip() {
        let mut buffer = Vec::new();
        {
            let mut writer = CacheWriter::new(&mut buffer);
            writer.write_u8(7).unwrap();
            writer.write_u16(65535).unwrap();
            writer.write_u32(0xDEADBEEF).unwrap();
            writer.write_i32(-42).unwrap();
            writer.write_utf("scripts/a.rs2").unwrap();
            writer.write_utf("").unwrap();
        }
        let mut reader = CacheReader::new(buffer.as_slice());
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_u16().unwrap(), 65535);
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(reader.read_i32().unwrap(), -42);
        assert_eq!(reader.read_utf().unwrap(), "scripts/a.rs2");
        assert_eq!(reader.read_utf().unwrap(), "");
    }

    #[test]
    fn test_big_endian_layout() {
        let mut buffer = Vec::new();
        CacheWriter::new(&mut buffer).write_u32(1).unwrap();
        assert_eq!(buffer, vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_truncated_input_fails() {
        let mut reader = CacheReader::new([0u8, 5].as_slice());
        assert!(reader.read_utf().is_err());
    }
}
