use std::fmt;
use std::str::FromStr;

/// The six value kinds a variable can be declared with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    Word,
    Dword,
    Byte,
    Address,
    String,
    Bool,
}

impl Kind {
    pub const ALL: [Kind; 6] = [
        Kind::Word,
        Kind::Dword,
        Kind::Byte,
        Kind::Address,
        Kind::String,
        Kind::Bool,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Kind::Word => "word",
            Kind::Dword => "dword",
            Kind::Byte => "byte",
            Kind::Address => "address",
            Kind::String => "string",
            Kind::Bool => "bool",
        }
    }

    /// Kinds whose payload is an integer.
    pub fn is_numeric(self) -> bool {
        matches!(self, Kind::Word | Kind::Dword | Kind::Byte | Kind::Address)
    }

    /// Maps an immediate literal suffix (`5w`, `5d`, `5b`) to its kind.
    pub fn from_suffix(suffix: char) -> Option<Kind> {
        match suffix {
            'w' => Some(Kind::Word),
            'd' => Some(Kind::Dword),
            'b' => Some(Kind::Byte),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl FromStr for Kind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Payload of a variable. Which variant is valid depends on the kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Uninitialized,
    Integer(i64),
    Text(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    kind: Kind,
    value: Value,
    frame: usize,
}

impl Variable {
    /// A declared but never assigned variable.
    pub fn declared(kind: Kind) -> Self {
        Variable {
            kind,
            value: Value::Uninitialized,
            frame: 0,
        }
    }

    /// An integer-carrying variable. Panics in debug builds for non-numeric kinds.
    pub fn integer(kind: Kind, n: i64) -> Self {
        debug_assert!(kind.is_numeric(), "{} does not hold integers", kind);
        Variable {
            kind,
            value: Value::Integer(n),
            frame: 0,
        }
    }

    pub fn word(n: i64) -> Self {
        Variable::integer(Kind::Word, n)
    }

    pub fn address(n: i64) -> Self {
        Variable::integer(Kind::Address, n)
    }

    pub fn string(text: impl Into<String>) -> Self {
        Variable {
            kind: Kind::String,
            value: Value::Text(text.into()),
            frame: 0,
        }
    }

    pub fn boolean(b: bool) -> Self {
        Variable {
            kind: Kind::Bool,
            value: Value::Bool(b),
            frame: 0,
        }
    }

    /// Copy of this variable tagged with another creation frame.
    pub fn in_frame(&self, frame: usize) -> Self {
        Variable {
            frame,
            ..self.clone()
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Depth of the frame that created this variable; 0 for declarations.
    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.value {
            Value::Integer(n) if self.kind.is_numeric() => Some(n),
            _ => None,
        }
    }

    /// Only a bool holding true counts as true.
    pub fn is_true(&self) -> bool {
        self.kind == Kind::Bool && self.value == Value::Bool(true)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::Uninitialized => write!(f, "<uninitialized {}>", self.kind),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        for kind in Kind::ALL {
            assert_eq!(kind.name().parse::<Kind>(), Ok(kind));
        }
        assert_eq!(
            "float".parse::<Kind>(),
            Err(UnknownKind("float".to_string()))
        );
        assert!("Word".parse::<Kind>().is_err());
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(Kind::from_suffix('w'), Some(Kind::Word));
        assert_eq!(Kind::from_suffix('d'), Some(Kind::Dword));
        assert_eq!(Kind::from_suffix('b'), Some(Kind::Byte));
        assert_eq!(Kind::from_suffix('x'), None);
    }

    #[test]
    fn test_declared_is_uninitialized_in_frame_zero() {
        let var = Variable::declared(Kind::Dword);
        assert_eq!(var.kind(), Kind::Dword);
        assert_eq!(var.value(), &Value::Uninitialized);
        assert_eq!(var.frame(), 0);
        assert_eq!(var.as_integer(), None);
        assert_eq!(var.to_string(), "<uninitialized dword>");
    }

    #[test]
    fn test_truthiness() {
        assert!(Variable::boolean(true).is_true());
        assert!(!Variable::boolean(false).is_true());
        assert!(!Variable::declared(Kind::Bool).is_true());
        assert!(!Variable::word(1).is_true());
        assert!(!Variable::string("true").is_true());
    }

    #[test]
    fn test_display() {
        assert_eq!(Variable::word(3).to_string(), "3");
        assert_eq!(Variable::string("a b").to_string(), "a b");
        assert_eq!(Variable::boolean(false).to_string(), "false");
    }

    #[test]
    fn test_in_frame_copies_payload() {
        let var = Variable::word(7).in_frame(4);
        assert_eq!(var.frame(), 4);
        assert_eq!(var.as_integer(), Some(7));
    }
}
