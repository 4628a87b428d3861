//! Multi-dimensional array slices.
//!
//! An array column holds an [`ArrayId`]. The elements are moved as one slice
//! in row-major order, each element taking a fixed slot of the element field
//! [size][FieldDescriptor::size].
use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    Result, Transaction,
    charset::{self, Charset},
    error::StateError,
    gds::{ProtocolError, blr},
    types::{ArrayId, ConversionError, DbDataType, FieldDescriptor, Value, codec},
};

const LOOKUP_FIELD: &str = "\
SELECT Y.RDB$FIELD_TYPE, Y.RDB$FIELD_SCALE, Y.RDB$FIELD_LENGTH, Y.RDB$DIMENSIONS, \
X.RDB$FIELD_SOURCE, Y.RDB$CHARACTER_SET_ID \
FROM RDB$RELATION_FIELDS X, RDB$FIELDS Y \
WHERE X.RDB$FIELD_SOURCE = Y.RDB$FIELD_NAME AND X.RDB$RELATION_NAME = ? AND X.RDB$FIELD_NAME = ?";

const LOOKUP_BOUNDS: &str = "\
SELECT X.RDB$LOWER_BOUND, X.RDB$UPPER_BOUND FROM RDB$FIELD_DIMENSIONS X \
WHERE X.RDB$FIELD_NAME = ? ORDER BY X.RDB$DIMENSION";

/// Bounds of one dimension, both inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArrayBound {
    pub lower: i32,
    pub upper: i32,
}

impl ArrayBound {
    pub const fn new(lower: i32, upper: i32) -> Self {
        Self { lower, upper }
    }

    /// Element count of the dimension.
    pub fn len(&self) -> usize {
        (self.upper as i64 - self.lower as i64 + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Elements of an array together with its shape.
///
/// Elements are kept in row-major order, the last dimension varies fastest.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArrayValue {
    bounds: Vec<ArrayBound>,
    values: Vec<Value>,
}

impl ArrayValue {
    pub fn bounds(&self) -> &[ArrayBound] {
        &self.bounds
    }

    /// Element count of each dimension.
    pub fn shape(&self) -> Vec<usize> {
        self.bounds.iter().map(ArrayBound::len).collect()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Element at `subscripts`, one per dimension within its declared bounds.
    pub fn get(&self, subscripts: &[i32]) -> Option<&Value> {
        if subscripts.len() != self.bounds.len() {
            return None;
        }
        let mut offset = 0;
        for (bound, &sub) in self.bounds.iter().zip(subscripts) {
            if sub < bound.lower || sub > bound.upper {
                return None;
            }
            offset = offset * bound.len() + (sub as i64 - bound.lower as i64) as usize;
        }
        self.values.get(offset)
    }
}

/// Shape and element type of an array field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayDescriptor {
    /// Element BLR type.
    pub blr_type: u8,
    pub scale: i16,
    /// Element byte length, without the length prefix of `VARCHAR`.
    pub length: u16,
    pub relation: String,
    pub field: String,
    pub bounds: Vec<ArrayBound>,
    /// Charset of text elements.
    pub charset: &'static Charset,
}

impl ArrayDescriptor {
    pub fn dimensions(&self) -> usize {
        self.bounds.len()
    }

    /// Total element count, row-major over every dimension.
    pub fn element_count(&self) -> usize {
        if self.bounds.is_empty() {
            return 0;
        }
        self.bounds.iter().map(ArrayBound::len).product()
    }

    /// Descriptor of one element, used to encode and decode slots.
    pub fn element_field(&self) -> Result<FieldDescriptor> {
        let Some(sql_type) = blr::sql_type(self.blr_type) else {
            return Err(ProtocolError::other(format!("unknown array element type `{}`", self.blr_type)).into());
        };
        Ok(FieldDescriptor::new(sql_type, self.length)
            .with_scale(self.scale)
            .with_charset(self.charset)
            .with_relation(&self.relation)
            .with_name(&self.field))
    }

    /// Byte length of the whole slice.
    pub fn slice_length(&self) -> Result<usize> {
        Ok(self.element_count() * self.element_field()?.size())
    }

    /// Decode slice bytes into elements.
    ///
    /// A short slice leaves the remaining elements [`Value::Null`].
    pub fn decode(&self, slice: &[u8]) -> Result<ArrayValue> {
        let field = self.element_field()?;
        let size = field.size();
        let mut values = vec![Value::Null; self.element_count()];

        if size > 0 {
            for (value, slot) in values.iter_mut().zip(slice.chunks_exact(size)) {
                *value = codec::decode(&field, slot)?;
            }
        }

        Ok(ArrayValue { bounds: self.bounds.clone(), values })
    }

    /// Encode elements into slice bytes.
    ///
    /// Missing and NULL elements are zeroed.
    pub fn encode(&self, values: &[Value]) -> Result<Bytes> {
        let field = self.element_field()?;
        let size = field.size();
        let count = self.element_count();
        if values.len() > count {
            return Err(ConversionError::Overflow { field: DbDataType::Array }.into());
        }

        let mut slice = BytesMut::with_capacity(count * size);
        for n in 0..count {
            let start = slice.len();
            if let Some(value) = values.get(n).filter(|v| !v.is_null()) {
                codec::encode(&field, value, &mut slice)?;
            }
            slice.put_bytes(0, size - (slice.len() - start));
        }

        Ok(slice.freeze())
    }
}

/// Array content of one column, scoped to a transaction.
#[derive(Debug)]
pub struct Array {
    transaction: Transaction,
    id: ArrayId,
    descriptor: ArrayDescriptor,
}

impl Array {
    /// New array with given descriptor, [`write`][Array::write] assigns the id.
    pub fn new(transaction: &Transaction, descriptor: ArrayDescriptor) -> Self {
        Self::with_id(transaction, ArrayId::NULL, descriptor)
    }

    pub fn with_id(transaction: &Transaction, id: ArrayId, descriptor: ArrayDescriptor) -> Self {
        Self { transaction: transaction.clone(), id, descriptor }
    }

    /// New array with descriptor looked up from the system tables.
    pub fn from_field(transaction: &Transaction, relation: &str, field: &str) -> Result<Self> {
        Self::from_field_with_id(transaction, ArrayId::NULL, relation, field)
    }

    pub fn from_field_with_id(transaction: &Transaction, id: ArrayId, relation: &str, field: &str) -> Result<Self> {
        let descriptor = lookup_descriptor(transaction, relation, field)?;
        Ok(Self::with_id(transaction, id, descriptor))
    }

    pub fn id(&self) -> ArrayId {
        self.id
    }

    pub fn descriptor(&self) -> &ArrayDescriptor {
        &self.descriptor
    }

    /// Read every element.
    pub fn read(&self) -> Result<ArrayValue> {
        let tx = self.transaction.handle()?;
        let length = self.descriptor.slice_length()?;
        let id = self.id;
        let desc = &self.descriptor;
        let slice = self
            .transaction
            .attachment()
            .call(|t| t.get_slice(tx, id, desc, length))?;
        self.descriptor.decode(&slice)
    }

    /// Write every element, returns the new id to bind as parameter.
    pub fn write(&mut self, values: &[Value]) -> Result<ArrayId> {
        let tx = self.transaction.handle()?;
        let slice = self.descriptor.encode(values)?;
        let id = self.id;
        let desc = &self.descriptor;
        self.id = self
            .transaction
            .attachment()
            .call(|t| t.put_slice(tx, id, desc, &slice))?;
        Ok(self.id)
    }
}

/// Query element type and bounds of `relation.field`.
pub(crate) fn lookup_descriptor(transaction: &Transaction, relation: &str, field: &str) -> Result<ArrayDescriptor> {
    let attachment = transaction.attachment();
    let mut stmt = attachment.create_statement();

    stmt.prepare(transaction, LOOKUP_FIELD)?;
    stmt.execute(&[Value::from(relation), Value::from(field)])?;
    let Some(row) = stmt.fetch()? else {
        return Err(StateError::new(format!("array field `{relation}.{field}` not found")).into());
    };
    let (blr_type, scale, length, _dimensions, source, charset_id): (i16, i16, i16, i16, String, Option<i16>) =
        row.decode()?;

    stmt.prepare(transaction, LOOKUP_BOUNDS)?;
    stmt.execute(&[Value::from(source.trim_end())])?;
    let mut bounds = vec![];
    while let Some(row) = stmt.fetch()? {
        let (lower, upper): (i32, i32) = row.decode()?;
        bounds.push(ArrayBound::new(lower, upper));
    }
    stmt.release()?;

    let charset = charset_id
        .and_then(|id| u8::try_from(id).ok())
        .and_then(charset::by_id)
        .unwrap_or(attachment.charset());

    Ok(ArrayDescriptor {
        blr_type: blr_type as u8,
        scale,
        length: length as u16,
        relation: relation.into(),
        field: field.into(),
        bounds,
        charset,
    })
}
