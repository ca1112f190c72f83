//! Check the table without mutating anything.

use planmatrix_core::sync::validate;
use planmatrix_core::{MatrixDb, Schema, TableStore};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let store = MatrixDb::open()?;
    let schema = Schema::resolve(&store.header()?)?;
    let rows = store.read_rows()?;

    match validate::validate(&rows, &schema) {
        Ok(()) => {
            println!("{} row(s), all valid.", rows.len());
            Ok(())
        }
        Err(report) => {
            // The report is the output, not a crash.
            println!("{report}");
            std::process::exit(1);
        }
    }
}
