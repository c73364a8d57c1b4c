//! Packet buffer implementation
//!
//! Byte cursor used to build info packets and extended info blocks:
//! - Big/little-endian integers
//! - RS-specific transforms (byte A/C/S, short A, middle-endian ints)
//! - Smart encoding for variable-length integers
//! - Bit access mode for the bit-packed entity sections
//!
//! The read side covers what tests need to decode published packets.

use bytes::{BufMut, BytesMut};

/// Packet buffer for reading and writing game protocol data
#[derive(Debug, Clone)]
pub struct PacketBuffer {
    /// Internal byte buffer
    data: BytesMut,
    /// Current read position
    read_pos: usize,
    /// Bit access position (in bits)
    bit_pos: usize,
    /// Whether currently in bit access mode
    in_bit_mode: bool,
}

impl PacketBuffer {
    /// Create a new empty packet buffer
    pub fn new() -> Self {
        Self::wrap(BytesMut::new())
    }

    /// Create a packet buffer with a specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self::wrap(BytesMut::with_capacity(capacity))
    }

    /// Create a packet buffer from existing bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::wrap(BytesMut::from(bytes))
    }

    fn wrap(data: BytesMut) -> Self {
        Self {
            data,
            read_pos: 0,
            bit_pos: 0,
            in_bit_mode: false,
        }
    }

    // ============ Properties ============

    /// Get the total length of the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the number of bytes remaining to read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.read_pos)
    }

    /// Get a reference to the underlying bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Clear the buffer and reset positions, keeping the allocation
    pub fn clear(&mut self) {
        self.data.clear();
        self.read_pos = 0;
        self.bit_pos = 0;
        self.in_bit_mode = false;
    }

    /// Reset read position to start
    pub fn reset(&mut self) {
        self.read_pos = 0;
        self.bit_pos = 0;
        self.in_bit_mode = false;
    }

    // ============ Reading Methods ============

    /// Read an unsigned byte
    pub fn read_ubyte(&mut self) -> u8 {
        if self.read_pos >= self.data.len() {
            return 0;
        }
        let value = self.data[self.read_pos];
        self.read_pos += 1;
        value
    }

    /// Read an unsigned big-endian short (2 bytes)
    pub fn read_ushort(&mut self) -> u16 {
        let b1 = self.read_ubyte() as u16;
        let b2 = self.read_ubyte() as u16;
        (b1 << 8) | b2
    }

    /// Read a signed big-endian int (4 bytes)
    pub fn read_int(&mut self) -> i32 {
        let b1 = self.read_ubyte() as i32;
        let b2 = self.read_ubyte() as i32;
        let b3 = self.read_ubyte() as i32;
        let b4 = self.read_ubyte() as i32;
        (b1 << 24) | (b2 << 16) | (b3 << 8) | b4
    }

    /// Read byte A (value - 128)
    pub fn read_byte_a(&mut self) -> u8 {
        self.read_ubyte().wrapping_sub(128)
    }

    /// Read byte S (128 - value)
    pub fn read_byte_s(&mut self) -> u8 {
        (128u8).wrapping_sub(self.read_ubyte())
    }

    /// Read short A (big-endian with A modifier on second byte)
    pub fn read_short_a(&mut self) -> u16 {
        let b1 = self.read_ubyte() as u16;
        let b2 = self.read_ubyte().wrapping_sub(128) as u16;
        (b1 << 8) | b2
    }

    // ============ Writing Methods (Big-Endian) ============

    /// Write a signed byte
    pub fn write_byte(&mut self, value: i8) {
        self.data.put_i8(value);
    }

    /// Write an unsigned byte
    pub fn write_ubyte(&mut self, value: u8) {
        self.data.put_u8(value);
    }

    /// Write an unsigned big-endian short (2 bytes)
    pub fn write_ushort(&mut self, value: u16) {
        self.data.put_u16(value);
    }

    /// Write a signed big-endian int (4 bytes)
    pub fn write_int(&mut self, value: i32) {
        self.data.put_i32(value);
    }

    /// Write a signed big-endian long (8 bytes)
    pub fn write_long(&mut self, value: i64) {
        self.data.put_i64(value);
    }

    /// Write an unsigned little-endian short (2 bytes)
    pub fn write_ushort_le(&mut self, value: u16) {
        self.data.put_u16_le(value);
    }

    // ============ RS-Specific Writing Methods ============

    /// Write byte A (value + 128)
    pub fn write_byte_a(&mut self, value: u8) {
        self.write_ubyte(value.wrapping_add(128));
    }

    /// Write byte S (128 - value)
    pub fn write_byte_s(&mut self, value: u8) {
        self.write_ubyte((128u8).wrapping_sub(value));
    }

    /// Write short A (big-endian with A modifier on second byte)
    pub fn write_short_a(&mut self, value: u16) {
        self.write_ubyte(((value >> 8) & 0xff) as u8);
        self.write_ubyte((value as u8).wrapping_add(128));
    }

    /// Write little-endian short A
    pub fn write_short_le_a(&mut self, value: u16) {
        self.write_ubyte((value as u8).wrapping_add(128));
        self.write_ubyte(((value >> 8) & 0xff) as u8);
    }

    /// Write int variant 1 (middle-endian 1)
    pub fn write_int_v1(&mut self, value: i32) {
        self.write_ubyte(((value >> 8) & 0xff) as u8);
        self.write_ubyte((value & 0xff) as u8);
        self.write_ubyte(((value >> 24) & 0xff) as u8);
        self.write_ubyte(((value >> 16) & 0xff) as u8);
    }

    /// Write a smart value (1 or 2 bytes depending on magnitude)
    ///
    /// Values must stay below 32768.
    pub fn write_smart(&mut self, value: u16) {
        debug_assert!(value < 32768, "smart value {} out of range", value);
        if value < 128 {
            self.write_ubyte(value as u8);
        } else {
            self.write_ushort(value + 32768);
        }
    }

    /// Write a null-terminated string
    pub fn write_string(&mut self, value: &str) {
        self.data.extend_from_slice(value.as_bytes());
        self.write_ubyte(0);
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Write bytes in reverse order
    pub fn write_bytes_reversed(&mut self, bytes: &[u8]) {
        self.data.reserve(bytes.len());
        for &b in bytes.iter().rev() {
            self.data.put_u8(b);
        }
    }

    /// Overwrite an already written byte, e.g. a length placeholder
    pub fn set_byte(&mut self, position: usize, value: u8) {
        self.data[position] = value;
    }

    /// Reverse everything written from `position` onwards
    pub fn reverse_from(&mut self, position: usize) {
        self.data[position..].reverse();
    }

    /// Drop everything written from `len` onwards
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    // ============ Bit Access ============

    /// Enter bit access mode for writing (appends to end)
    pub fn start_bit_access(&mut self) {
        self.bit_pos = self.data.len() * 8;
        self.in_bit_mode = true;
    }

    /// Exit bit access mode, leaving the buffer on a byte boundary
    pub fn end_bit_access(&mut self) {
        let byte_len = (self.bit_pos + 7) / 8;
        self.data.resize(byte_len, 0);
        self.in_bit_mode = false;
    }

    /// Enter bit access mode for reading at the current read position
    pub fn start_bit_read(&mut self) {
        self.bit_pos = self.read_pos * 8;
        self.in_bit_mode = true;
    }

    /// Exit bit reading, moving the read position to the next byte boundary
    pub fn end_bit_read(&mut self) {
        self.read_pos = (self.bit_pos + 7) / 8;
        self.in_bit_mode = false;
    }

    /// Read bits from the buffer
    pub fn read_bits(&mut self, count: usize) -> u32 {
        assert!(self.in_bit_mode, "Not in bit access mode");
        debug_assert!(count > 0 && count <= 32);

        let mut byte_pos = self.bit_pos / 8;
        let mut bit_offset = 8 - (self.bit_pos % 8);
        let mut value = 0u32;
        let mut remaining = count;

        self.bit_pos += count;

        while remaining > bit_offset {
            value |= ((self.data.get(byte_pos).copied().unwrap_or(0) as u32)
                & ((1u32 << bit_offset) - 1))
                << (remaining - bit_offset);
            remaining -= bit_offset;
            byte_pos += 1;
            bit_offset = 8;
        }

        if remaining == bit_offset {
            value |=
                (self.data.get(byte_pos).copied().unwrap_or(0) as u32) & ((1u32 << bit_offset) - 1);
        } else {
            value |= ((self.data.get(byte_pos).copied().unwrap_or(0) as u32)
                >> (bit_offset - remaining))
                & ((1u32 << remaining) - 1);
        }

        value
    }

    /// Write bits to the buffer
    pub fn write_bits(&mut self, count: usize, value: u32) {
        assert!(self.in_bit_mode, "Not in bit access mode");
        debug_assert!(count > 0 && count < 32);

        let mut byte_pos = self.bit_pos / 8;
        let mut bit_offset = 8 - (self.bit_pos % 8);
        let mut remaining = count;
        let val = value;

        self.bit_pos += count;

        let needed = (self.bit_pos + 7) / 8;
        if self.data.len() < needed {
            self.data.resize(needed, 0);
        }

        while remaining > bit_offset {
            let mask = (1u32 << bit_offset) - 1;
            self.data[byte_pos] &= !(mask as u8);
            self.data[byte_pos] |= ((val >> (remaining - bit_offset)) & mask) as u8;
            remaining -= bit_offset;
            byte_pos += 1;
            bit_offset = 8;
        }

        if remaining == bit_offset {
            let mask = (1u32 << bit_offset) - 1;
            self.data[byte_pos] &= !(mask as u8);
            self.data[byte_pos] |= (val & mask) as u8;
        } else {
            let mask = ((1u32 << remaining) - 1) << (bit_offset - remaining);
            self.data[byte_pos] &= !(mask as u8);
            self.data[byte_pos] |=
                ((val & ((1u32 << remaining) - 1)) << (bit_offset - remaining)) as u8;
        }
    }

    /// Write a single flag bit
    #[inline]
    pub fn write_bit(&mut self, flag: bool) {
        self.write_bits(1, flag as u32);
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&[u8]> for PacketBuffer {
    fn from(slice: &[u8]) -> Self {
        Self::from_bytes(slice)
    }
}

impl AsRef<[u8]> for PacketBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_read_write() {
        let mut buf = PacketBuffer::new();

        buf.write_ubyte(255);
        buf.write_ushort(1234);
        buf.write_int(987654);

        buf.reset();

        assert_eq!(buf.read_ubyte(), 255);
        assert_eq!(buf.read_ushort(), 1234);
        assert_eq!(buf.read_int(), 987654);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn test_rs_specific_encodings() {
        let mut buf = PacketBuffer::new();

        buf.write_byte_a(100);
        buf.write_byte_s(50);
        buf.write_short_a(0x1234);

        buf.reset();

        assert_eq!(buf.read_byte_a(), 100);
        assert_eq!(buf.read_byte_s(), 50);
        assert_eq!(buf.read_short_a(), 0x1234);
    }

    #[test]
    fn test_little_and_middle_endian_layout() {
        let mut buf = PacketBuffer::new();

        buf.write_ushort_le(0xBEEF);
        buf.write_short_le_a(0x4321);
        buf.write_int_v1(0x12345678);
        buf.write_long(-2);

        assert_eq!(
            buf.as_bytes(),
            &[
                0xEF, 0xBE, 0xA1, 0x43, 0x56, 0x78, 0x12, 0x34, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
                0xFF, 0xFF, 0xFE
            ]
        );
    }

    #[test]
    fn test_smart_encoding() {
        let mut buf = PacketBuffer::new();

        buf.write_smart(50);
        buf.write_smart(200);
        assert_eq!(buf.as_bytes(), &[50, 0x80, 200]);
    }

    #[test]
    fn test_bit_access() {
        let mut buf = PacketBuffer::new();

        buf.start_bit_access();
        buf.write_bits(1, 1);
        buf.write_bits(5, 15);
        buf.write_bits(11, 1234);
        buf.end_bit_access();

        buf.reset();
        buf.start_bit_read();

        assert_eq!(buf.read_bits(1), 1);
        assert_eq!(buf.read_bits(5), 15);
        assert_eq!(buf.read_bits(11), 1234);
    }

    #[test]
    fn test_bit_access_pads_to_byte_boundary() {
        let mut buf = PacketBuffer::new();
        buf.write_ubyte(0xAA);

        buf.start_bit_access();
        buf.write_bit(true);
        buf.end_bit_access();

        assert_eq!(buf.as_bytes(), &[0xAA, 0x80]);

        buf.write_ubyte(0x55);
        assert_eq!(buf.as_bytes(), &[0xAA, 0x80, 0x55]);
    }

    #[test]
    fn test_bit_read_then_bytes() {
        let mut buf = PacketBuffer::new();
        buf.start_bit_access();
        buf.write_bits(3, 5);
        buf.end_bit_access();
        buf.write_ushort(777);

        buf.reset();
        buf.start_bit_read();
        assert_eq!(buf.read_bits(3), 5);
        buf.end_bit_read();
        assert_eq!(buf.read_ushort(), 777);
    }

    #[test]
    fn test_strings_and_reversed_bytes() {
        let mut buf = PacketBuffer::new();
        buf.write_string("Hi");
        buf.write_byte(-1);
        buf.write_bytes_reversed(&[1, 2, 3]);

        assert_eq!(buf.as_bytes(), &[b'H', b'i', 0, 0xFF, 3, 2, 1]);
    }

    #[test]
    fn test_in_place_length_prefix() {
        let mut buf = PacketBuffer::new();
        buf.write_ubyte(0xEE);
        let start = buf.len();
        buf.write_ubyte(0);
        buf.write_bytes(&[1, 2, 3]);
        buf.reverse_from(start + 1);
        buf.set_byte(start, 3);
        assert_eq!(buf.as_bytes(), &[0xEE, 3, 3, 2, 1]);

        buf.truncate(start);
        assert_eq!(buf.as_bytes(), &[0xEE]);
    }

    #[test]
    fn test_clear_keeps_buffer_usable() {
        let mut buf = PacketBuffer::with_capacity(16);
        buf.write_int(1);
        buf.clear();
        assert!(buf.is_empty());
        buf.write_ubyte(9);
        assert_eq!(buf.as_bytes(), &[9]);
    }
}
