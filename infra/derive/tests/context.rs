use fv_derive::fv_error;
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Io = 1,
    Internal = 255,
}

#[fv_error(code = Code)]
pub enum SampleError {
    #[code(Io)]
    #[error("IO error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[code(Internal)]
    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn missing_file() -> Result<(), std::io::Error> {
    Err(std::io::Error::new(std::io::ErrorKind::NotFound, "container.enc"))
}

#[test]
fn context_is_attached_to_source_errors() {
    let err = missing_file().context("Reading container").unwrap_err();

    assert_eq!(err.code(), Code::Io);
    assert!(err.to_string().starts_with("IO error (Reading container)"));
}

#[test]
fn context_overrides_existing_error_context() {
    let result: Result<(), SampleError> = Err("unexpected state".into());
    let err = result.context("Finalizing").unwrap_err();

    assert_eq!(err.code(), Code::Internal);
    assert_eq!(err.to_string(), "Internal error (Finalizing): unexpected state");
}

#[test]
fn question_mark_converts_source_errors() {
    fn run() -> Result<(), SampleError> {
        missing_file()?;
        Ok(())
    }

    let err = run().unwrap_err();
    assert!(matches!(err, SampleError::Io { context: None, .. }));
}
