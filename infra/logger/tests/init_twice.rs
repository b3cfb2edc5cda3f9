use fv_logger::{Logger, LoggerError};
use tempfile::tempdir;

#[test]
fn second_install_is_refused() {
    let _first = Logger::builder().name("filevault-first").init().expect("first install");

    let tmp_dir = tempdir().expect("temp dir");
    let err = Logger::builder()
        .name("filevault-second")
        .directory(tmp_dir.path().join("logs"))
        .init()
        .expect_err("only one global subscriber may exist");

    assert!(matches!(err, LoggerError::Subscriber { .. }), "unexpected error: {err}");
}
