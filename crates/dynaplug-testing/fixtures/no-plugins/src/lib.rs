//! An ordinary shared library.

#[no_mangle]
pub extern "C" fn dynaplug_fixture_answer() -> u32 {
    42
}
