//! Build script for the embedded SQL migrations.
//!
//! `sqlx::migrate!` reads `data/sql/sqlite` at compile time; a new migration
//! file has to trigger a rebuild.

fn main() {
    println!("cargo:rerun-if-changed=data/sql/sqlite");
}
