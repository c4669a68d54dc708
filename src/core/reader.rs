//! Cursor over a tagged byte stream.
//!
//! Composite decoders walk their input through a [`TagReader`], which tracks
//! the stack of open context groups. A closing tag that does not match the
//! innermost opening tag, or input that ends inside a group, fails with
//! [`BacnetError::UnbalancedContextTags`].

use crate::core::identity::ObjectIdentifier;
use crate::core::primitive::{self, content};
use crate::core::tag::{decode_tag, Tag, TagKind};
use crate::core::types::{ApplicationTag, BacnetDate, BacnetTime, BacnetValue};
use crate::error::{BacnetError, Result};

#[derive(Debug)]
pub struct TagReader<'a> {
    buf: &'a [u8],
    start: usize,
    pos: usize,
    open: Vec<u8>,
}

impl<'a> TagReader<'a> {
    pub fn new(buf: &'a [u8], offset: usize) -> Self {
        Self {
            buf,
            start: offset,
            pos: offset,
            open: Vec::new(),
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn consumed(&self) -> usize {
        self.pos - self.start
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Tag at the cursor without consuming it; `None` at end of input.
    pub fn peek(&self) -> Result<Option<Tag>> {
        if self.is_at_end() {
            return Ok(None);
        }
        decode_tag(self.buf, self.pos).map(|(tag, _)| Some(tag))
    }

    pub fn peek_is_context(&self, number: u8) -> Result<bool> {
        Ok(self.peek()?.is_some_and(|tag| tag.is_context(number)))
    }

    pub fn peek_is_opening(&self, number: u8) -> Result<bool> {
        Ok(self.peek()?.is_some_and(|tag| tag.is_opening(number)))
    }

    /// True when the next tag closes group `number`. Any other closing tag,
    /// or running out of input, means the groups are unbalanced.
    pub fn at_closing(&self, number: u8) -> Result<bool> {
        match self.peek()? {
            None => Err(self.unbalanced()),
            Some(tag) if tag.kind == TagKind::Closing => {
                if tag.number == number {
                    Ok(true)
                } else {
                    Err(self.unbalanced())
                }
            }
            Some(_) => Ok(false),
        }
    }

    pub fn open(&mut self, number: u8) -> Result<()> {
        let (tag, len) = decode_tag(self.buf, self.pos)?;
        if !tag.is_opening(number) {
            return Err(BacnetError::MalformedTag { offset: self.pos });
        }
        self.open.push(number);
        self.pos += len;
        Ok(())
    }

    pub fn close(&mut self, number: u8) -> Result<()> {
        if self.is_at_end() || self.open.last() != Some(&number) {
            return Err(self.unbalanced());
        }
        let (tag, len) = decode_tag(self.buf, self.pos)?;
        if !tag.is_closing(number) {
            return Err(self.unbalanced());
        }
        self.open.pop();
        self.pos += len;
        Ok(())
    }

    /// Finish reading. Returns the bytes consumed since the start offset.
    pub fn finish(self) -> Result<usize> {
        if !self.open.is_empty() {
            return Err(self.unbalanced());
        }
        Ok(self.consumed())
    }

    fn unbalanced(&self) -> BacnetError {
        BacnetError::UnbalancedContextTags { offset: self.pos }
    }

    /// Any application-tagged primitive.
    pub fn application(&mut self) -> Result<BacnetValue> {
        let (value, len) = primitive::decode_application(self.buf, self.pos)?;
        self.pos += len;
        Ok(value)
    }

    fn expect_application(&mut self, kind: ApplicationTag) -> Result<&'a [u8]> {
        let offset = self.pos;
        let (tag, header) = decode_tag(self.buf, offset)?;
        if !tag.is_application() || tag.number != kind.number() {
            return Err(BacnetError::MalformedTag { offset });
        }
        let len = tag.length() as usize;
        let bytes = content(self.buf, offset + header, len, offset)?;
        self.pos += header + len;
        Ok(bytes)
    }

    fn expect_context(&mut self, number: u8) -> Result<(&'a [u8], usize)> {
        let offset = self.pos;
        let (tag, header) = decode_tag(self.buf, offset)?;
        if !tag.is_context(number) {
            return Err(BacnetError::MalformedTag { offset });
        }
        let len = tag.length() as usize;
        let bytes = content(self.buf, offset + header, len, offset)?;
        self.pos += header + len;
        Ok((bytes, offset))
    }

    pub fn application_unsigned(&mut self) -> Result<u32> {
        let offset = self.pos;
        primitive::decode_unsigned(self.expect_application(ApplicationTag::UnsignedInt)?, offset)
    }

    pub fn application_enumerated(&mut self) -> Result<u32> {
        let offset = self.pos;
        primitive::decode_unsigned(self.expect_application(ApplicationTag::Enumerated)?, offset)
    }

    pub fn application_object_id(&mut self) -> Result<ObjectIdentifier> {
        let offset = self.pos;
        primitive::decode_object_id(self.expect_application(ApplicationTag::ObjectId)?, offset)
    }

    pub fn application_octet_string(&mut self) -> Result<Vec<u8>> {
        Ok(self.expect_application(ApplicationTag::OctetString)?.to_vec())
    }

    pub fn application_date(&mut self) -> Result<BacnetDate> {
        let offset = self.pos;
        primitive::decode_date(self.expect_application(ApplicationTag::Date)?, offset)
    }

    pub fn application_time(&mut self) -> Result<BacnetTime> {
        let offset = self.pos;
        primitive::decode_time(self.expect_application(ApplicationTag::Time)?, offset)
    }

    pub fn context_unsigned(&mut self, number: u8) -> Result<u32> {
        let (bytes, offset) = self.expect_context(number)?;
        primitive::decode_unsigned(bytes, offset)
    }

    pub fn context_enumerated(&mut self, number: u8) -> Result<u32> {
        self.context_unsigned(number)
    }

    pub fn context_object_id(&mut self, number: u8) -> Result<ObjectIdentifier> {
        let (bytes, offset) = self.expect_context(number)?;
        primitive::decode_object_id(bytes, offset)
    }

    pub fn context_boolean(&mut self, number: u8) -> Result<bool> {
        let (bytes, offset) = self.expect_context(number)?;
        match bytes {
            [value] => Ok(*value != 0),
            _ => Err(BacnetError::MalformedTag { offset }),
        }
    }

    pub fn context_real(&mut self, number: u8) -> Result<f32> {
        let (bytes, offset) = self.expect_context(number)?;
        primitive::decode_real(bytes, offset)
    }

    pub fn context_character_string(&mut self, number: u8) -> Result<String> {
        let (bytes, offset) = self.expect_context(number)?;
        primitive::decode_character_string(bytes, offset)
    }

    pub fn optional_context_unsigned(&mut self, number: u8) -> Result<Option<u32>> {
        if self.peek_is_context(number)? {
            self.context_unsigned(number).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn optional_context_real(&mut self, number: u8) -> Result<Option<f32>> {
        if self.peek_is_context(number)? {
            self.context_real(number).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn optional_context_character_string(&mut self, number: u8) -> Result<Option<String>> {
        if self.peek_is_context(number)? {
            self.context_character_string(number).map(Some)
        } else {
            Ok(None)
        }
    }
}
