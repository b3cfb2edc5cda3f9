use fv_derive::fv_error;
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Truncated = 2,
    Internal = 255,
}

#[fv_error(code = Code)]
pub enum ReadError {
    #[code(Truncated)]
    #[error("Truncated input{}: {message}", format_context(.context))]
    Truncated { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[code(Internal)]
    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn main() {
    let err: ReadError = "boom".into();
    assert_eq!(err.code(), Code::Internal);
}
