#![forbid(unsafe_code)]

/// `embed_migrations!` cannot track the migration directory by itself, so
/// changes to the SQL files would not trigger a rebuild without this hint.
fn main() {
    println!("cargo:rerun-if-changed=./migrations");
}
