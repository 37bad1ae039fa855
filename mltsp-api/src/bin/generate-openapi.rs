//! Prints the MLTSP OpenAPI document.
//!
//! Output is JSON on stdout.
//!
//! Usage:
//!   cargo run -p mltsp-api --bin generate-openapi --features openapi > openapi.json

use mltsp_api::ApiDoc;

fn main() {
    match ApiDoc::to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI document: {}", e);
            std::process::exit(1);
        }
    }
}
