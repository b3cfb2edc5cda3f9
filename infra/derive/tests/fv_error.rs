#[test]
fn fv_error_ui() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/fv_error_pass.rs");
    t.pass("tests/ui/fv_error_codes_pass.rs");
}
