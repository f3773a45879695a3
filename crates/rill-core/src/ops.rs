use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum BinOpKind {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
}

impl BinOpKind {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinOpKind::Add | BinOpKind::Sub | BinOpKind::Mul | BinOpKind::Div | BinOpKind::Mod
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOpKind::Lt | BinOpKind::Le | BinOpKind::Gt | BinOpKind::Ge
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinOpKind::Eq | BinOpKind::Ne)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOpKind::And | BinOpKind::Or)
    }

    /// Binding power used by the Pratt parser. Higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinOpKind::Or => 2,
            BinOpKind::And => 3,
            BinOpKind::Eq | BinOpKind::Ne => 4,
            BinOpKind::Lt | BinOpKind::Le | BinOpKind::Gt | BinOpKind::Ge => 5,
            BinOpKind::Add | BinOpKind::Sub => 6,
            BinOpKind::Mul | BinOpKind::Div | BinOpKind::Mod => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum UnOpKind {
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "-")]
    Neg,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn symbols_round_trip_through_strum() {
        assert_eq!(BinOpKind::from_str("<=").ok(), Some(BinOpKind::Le));
        assert_eq!(BinOpKind::Mod.to_string(), "%");
        assert_eq!(UnOpKind::from_str("!").ok(), Some(UnOpKind::Not));
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert!(BinOpKind::Mul.precedence() > BinOpKind::Add.precedence());
        assert!(BinOpKind::And.precedence() > BinOpKind::Or.precedence());
    }
}
