/// Reserved words of the expression language.
///
/// `true`, `false`, `null` and `undefined` are literals, not keywords; see
/// [`super::literal::Literal`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display, strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    Const,
    Let,
    Var,
    Return,
    If,
    Else,
    While,
    New,
    Typeof,
}
