use std::fmt;

use crate::{
    charset::{self, Charset},
    gds::codes::*,
};

/// Charset id the engine uses for "current attachment charset".
const CS_DYNAMIC: u8 = 127;

/// Logical type of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DbDataType {
    Char,
    VarChar,
    SmallInt,
    Integer,
    BigInt,
    Numeric,
    Decimal,
    Float,
    Double,
    Date,
    Time,
    TimeStamp,
    /// Text blob, subtype 1.
    Text,
    /// Any other blob subtype.
    Binary,
    Array,
    /// `CHAR(16) CHARACTER SET OCTETS`.
    Guid,
    Boolean,
    Null,
}

impl DbDataType {
    /// Classify engine type.
    pub fn classify(sql_type: i16, sub_type: i16, scale: i16, length: u16, charset: &Charset) -> Self {
        if matches!(sql_type, SQL_TEXT | SQL_VARYING) && length == 16 && charset.is_octets() {
            return Self::Guid;
        }

        let fixed = |plain| match sub_type {
            2 => Self::Decimal,
            1 => Self::Numeric,
            _ if scale < 0 => Self::Decimal,
            _ => plain,
        };

        match sql_type {
            SQL_TEXT => Self::Char,
            SQL_VARYING => Self::VarChar,
            SQL_SHORT => fixed(Self::SmallInt),
            SQL_LONG => fixed(Self::Integer),
            SQL_QUAD | SQL_INT64 => fixed(Self::BigInt),
            SQL_FLOAT => Self::Float,
            SQL_DOUBLE | SQL_D_FLOAT => fixed(Self::Double),
            SQL_BLOB if sub_type == 1 => Self::Text,
            SQL_BLOB => Self::Binary,
            SQL_TIMESTAMP => Self::TimeStamp,
            SQL_TYPE_TIME => Self::Time,
            SQL_TYPE_DATE => Self::Date,
            SQL_ARRAY => Self::Array,
            SQL_BOOLEAN => Self::Boolean,
            _ => Self::Null,
        }
    }

    pub fn is_fixed_point(&self) -> bool {
        matches!(self, Self::Numeric | Self::Decimal)
    }
}

impl fmt::Display for DbDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Char => "CHAR",
            Self::VarChar => "VARCHAR",
            Self::SmallInt => "SMALLINT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Numeric => "NUMERIC",
            Self::Decimal => "DECIMAL",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE PRECISION",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::TimeStamp => "TIMESTAMP",
            Self::Text => "BLOB SUB_TYPE TEXT",
            Self::Binary => "BLOB",
            Self::Array => "ARRAY",
            Self::Guid => "CHAR(16) OCTETS",
            Self::Boolean => "BOOLEAN",
            Self::Null => "NULL",
        })
    }
}

/// Described column or parameter.
///
/// Immutable once described, shared by every row of the statement.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    sql_type: i16,
    sub_type: i16,
    scale: i16,
    length: u16,
    nullable: bool,
    charset: &'static Charset,
    name: String,
    alias: String,
    relation: String,
    owner: String,
}

impl FieldDescriptor {
    /// Create descriptor from raw engine type, the lowest bit is the nullable flag.
    pub fn new(sql_type: i16, length: u16) -> Self {
        Self {
            sql_type: sql_type & !1,
            sub_type: 0,
            scale: 0,
            length,
            nullable: sql_type & 1 == 1,
            charset: charset::default(),
            name: String::new(),
            alias: String::new(),
            relation: String::new(),
            owner: String::new(),
        }
    }

    pub fn with_scale(mut self, scale: i16) -> Self {
        self.scale = scale;
        self
    }

    /// Set subtype, for text field the low byte selects the charset.
    ///
    /// Charset `127` resolves to `dynamic`, unknown charsets to the default.
    pub fn with_sub_type(mut self, sub_type: i16, dynamic: &'static Charset) -> Self {
        self.sub_type = sub_type;
        if self.is_character() {
            self.charset = match sub_type.to_le_bytes()[0] {
                CS_DYNAMIC => dynamic,
                id => charset::by_id(id).unwrap_or(charset::default()),
            };
        }
        self
    }

    pub fn with_charset(mut self, charset: &'static Charset) -> Self {
        self.charset = charset;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.trim().into();
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = alias.trim().into();
        self
    }

    pub fn with_relation(mut self, relation: &str) -> Self {
        self.relation = relation.trim().into();
        self
    }

    pub fn with_owner(mut self, owner: &str) -> Self {
        self.owner = owner.trim().into();
        self
    }

    /// Engine type without nullable flag.
    pub fn sql_type(&self) -> i16 {
        self.sql_type
    }

    pub fn sub_type(&self) -> i16 {
        self.sub_type
    }

    pub fn scale(&self) -> i16 {
        self.scale
    }

    /// Declared byte length.
    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn charset(&self) -> &'static Charset {
        self.charset
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column alias, falls back to name.
    pub fn alias(&self) -> &str {
        if self.alias.is_empty() { &self.name } else { &self.alias }
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn data_type(&self) -> DbDataType {
        DbDataType::classify(self.sql_type, self.sub_type, self.scale, self.length, self.charset)
    }

    /// Returns `true` for `CHAR` and `VARCHAR`.
    pub fn is_character(&self) -> bool {
        matches!(self.sql_type, SQL_TEXT | SQL_VARYING)
    }

    pub fn is_blob(&self) -> bool {
        self.sql_type == SQL_BLOB
    }

    pub fn is_array(&self) -> bool {
        self.sql_type == SQL_ARRAY
    }

    /// Maximum characters of a character field.
    pub fn char_count(&self) -> usize {
        self.length as usize / self.charset.bytes_per_char()
    }

    /// Byte size of the value in a row buffer.
    pub fn size(&self) -> usize {
        match self.sql_type {
            SQL_TEXT => self.length as usize,
            SQL_VARYING => self.length as usize + 2,
            SQL_SHORT => 2,
            SQL_LONG | SQL_FLOAT | SQL_TYPE_TIME | SQL_TYPE_DATE => 4,
            SQL_BOOLEAN => 1,
            SQL_NULL => 0,
            _ => 8,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classify() {
        let none = charset::default();
        assert_eq!(DbDataType::classify(SQL_LONG, 0, 0, 4, none), DbDataType::Integer);
        assert_eq!(DbDataType::classify(SQL_LONG, 0, -2, 4, none), DbDataType::Decimal);
        assert_eq!(DbDataType::classify(SQL_INT64, 1, -2, 8, none), DbDataType::Numeric);
        assert_eq!(DbDataType::classify(SQL_DOUBLE, 0, 0, 8, none), DbDataType::Double);
        assert_eq!(DbDataType::classify(SQL_BLOB, 1, 0, 8, none), DbDataType::Text);
        assert_eq!(DbDataType::classify(SQL_BLOB, 0, 0, 8, none), DbDataType::Binary);
        assert_eq!(DbDataType::classify(SQL_TEXT, 0, 0, 16, charset::octets()), DbDataType::Guid);
        assert_eq!(DbDataType::classify(SQL_TEXT, 0, 0, 16, none), DbDataType::Char);
    }

    #[test]
    fn nullable_flag() {
        let field = FieldDescriptor::new(SQL_VARYING + 1, 10);
        assert_eq!(field.sql_type(), SQL_VARYING);
        assert!(field.nullable());
        assert_eq!(field.size(), 12);
    }

    #[test]
    fn sub_type_charset() {
        let utf8 = charset::by_name("UTF8").unwrap();
        let field = FieldDescriptor::new(SQL_TEXT, 20).with_sub_type(4, charset::default());
        assert_eq!(field.charset(), utf8);
        assert_eq!(field.char_count(), 5);

        let dynamic = FieldDescriptor::new(SQL_TEXT, 20).with_sub_type(127, utf8);
        assert_eq!(dynamic.charset(), utf8);

        // subtype of non text field is not a charset
        let int = FieldDescriptor::new(SQL_LONG, 4).with_sub_type(1, utf8);
        assert_eq!(int.charset(), charset::default());
        assert_eq!(int.data_type(), DbDataType::Numeric);
    }

    #[test]
    fn alias_fallback() {
        let field = FieldDescriptor::new(SQL_LONG, 4).with_name("ID ");
        assert_eq!(field.alias(), "ID");
        assert_eq!(field.with_alias("X").alias(), "X");
    }
}
