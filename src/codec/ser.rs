use super::error::{Error, Result};
use serde::{
    ser::{
        self, SerializeStruct, SerializeTuple, SerializeTupleStruct,
    },
    Serialize,
};

/// Byte sink for the canonical encoder.
///
/// Implementors receive the packed encoding as a series of chunks in
/// canonical order. They may buffer them ([to_bytes]) or fold them into a
/// hash directly ([to_hash][super::to_hash]) without materializing the
/// message.
pub trait Writer {
    fn write(&mut self, chunk: &[u8]);
}

struct VecWriter(Vec<u8>);

impl Writer for VecWriter {
    fn write(&mut self, chunk: &[u8]) {
        self.0.extend_from_slice(chunk);
    }
}

/// Serializer producing the canonical packed encoding.
///
/// Packed means: unsigned integers big-endian at their natural width,
/// fixed-width byte arrays raw, struct and tuple fields concatenated in
/// declaration order, no padding, no length prefixes. The encoding is
/// injective as long as every field has a width fixed by its type, which is
/// why all variable-width serde types return an error.
pub struct Serializer<'a, W>
where
    W: Writer,
{
    writer: &'a mut W,
}

/// Write the canonical packed encoding of `value` into `writer`.
pub fn to_writer<T, W>(value: &T, writer: &mut W) -> Result<()>
where
    T: Serialize,
    W: Writer,
{
    let mut serializer = Serializer { writer };
    value.serialize(&mut serializer)
}

/// Canonical packed encoding of `value` as a byte vector.
///
/// This is the message signatures are made over (after hashing), see
/// [sig][crate::sig].
pub fn to_bytes<T>(value: &T) -> Result<Vec<u8>>
where
    T: Serialize,
{
    let mut writer = VecWriter(Vec::new());
    to_writer(value, &mut writer)?;
    Ok(writer.0)
}

impl<'a, 'b, W> ser::Serializer for &'a mut Serializer<'b, W>
where
    W: Writer,
{
    type Ok = ();
    type Error = Error;

    type SerializeSeq = ser::Impossible<(), Error>;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = ser::Impossible<(), Error>;
    type SerializeMap = ser::Impossible<(), Error>;
    type SerializeStruct = Self;
    type SerializeStructVariant = ser::Impossible<(), Error>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.serialize_u8(if v { 1 } else { 0 })
    }

    // Signed integers never appear in channel payloads. Rejecting them keeps
    // the canonical form free of sign-extension questions.
    fn serialize_i8(self, _: i8) -> Result<()> {
        Err(Error::TypeNotRepresentable("i8"))
    }

    fn serialize_i16(self, _: i16) -> Result<()> {
        Err(Error::TypeNotRepresentable("i16"))
    }

    fn serialize_i32(self, _: i32) -> Result<()> {
        Err(Error::TypeNotRepresentable("i32"))
    }

    fn serialize_i64(self, _: i64) -> Result<()> {
        Err(Error::TypeNotRepresentable("i64"))
    }

    fn serialize_i128(self, _: i128) -> Result<()> {
        Err(Error::TypeNotRepresentable("i128"))
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.writer.write(&v.to_be_bytes());
        Ok(())
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.writer.write(&v.to_be_bytes());
        Ok(())
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.writer.write(&v.to_be_bytes());
        Ok(())
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.writer.write(&v.to_be_bytes());
        Ok(())
    }

    fn serialize_u128(self, v: u128) -> Result<()> {
        self.writer.write(&v.to_be_bytes());
        Ok(())
    }

    fn serialize_f32(self, _: f32) -> Result<()> {
        Err(Error::TypeNotRepresentable("f32"))
    }

    fn serialize_f64(self, _: f64) -> Result<()> {
        Err(Error::TypeNotRepresentable("f64"))
    }

    fn serialize_char(self, _: char) -> Result<()> {
        Err(Error::TypeNotRepresentable("char"))
    }

    fn serialize_str(self, _: &str) -> Result<()> {
        Err(Error::TypeNotRepresentable("str"))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        // Only reached through the fixed-width newtypes in
        // [types][super::types], whose length is pinned by their type.
        self.writer.write(v);
        Ok(())
    }

    fn serialize_none(self) -> Result<()> {
        Err(Error::TypeNotRepresentable("none"))
    }

    fn serialize_some<T: ?Sized>(self, _: &T) -> Result<()>
    where
        T: Serialize,
    {
        Err(Error::TypeNotRepresentable("some"))
    }

    fn serialize_unit(self) -> Result<()> {
        Err(Error::TypeNotRepresentable("unit"))
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<()> {
        Err(Error::TypeNotRepresentable("unit struct"))
    }

    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Result<()> {
        Err(Error::TypeNotRepresentable("unit variant (enum)"))
    }

    fn serialize_newtype_struct<T: ?Sized>(self, _: &'static str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Result<()>
    where
        T: Serialize,
    {
        Err(Error::TypeNotRepresentable("newtype variant (enum)"))
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(Error::TypeNotRepresentable("seq"))
    }

    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::TypeNotRepresentable("tuple variant (enum)"))
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Error::TypeNotRepresentable("map"))
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self::SerializeStruct> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::TypeNotRepresentable("struct variant"))
    }
}

impl<'a, 'b, W> SerializeTuple for &'a mut Serializer<'b, W>
where
    W: Writer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a, 'b, W> SerializeTupleStruct for &'a mut Serializer<'b, W>
where
    W: Writer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a, 'b, W> SerializeStruct for &'a mut Serializer<'b, W>
where
    W: Writer,
{
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, _name: &'static str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}
