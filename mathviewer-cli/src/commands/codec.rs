//! Safe MathML encoding commands
use super::read_stdin;
use anyhow::Result;
use mathviewer_core::mathml::{safe_xml_decode, safe_xml_encode};
use mathviewer_core::DecodeOptions;

/// Print `input` (or stdin) in the safe alphabet
pub fn encode(input: Option<String>) -> Result<()> {
    let input = match input {
        Some(input) => input,
        None => read_stdin()?,
    };
    println!("{}", safe_xml_encode(input.trim_end_matches('\n')));
    Ok(())
}

/// Print `input` (or stdin) decoded from the safe alphabet
pub fn decode(input: Option<String>, blackboard: bool) -> Result<()> {
    let input = match input {
        Some(input) => input,
        None => read_stdin()?,
    };
    let decoded = safe_xml_decode(input.trim_end_matches('\n'), DecodeOptions { blackboard });
    println!("{decoded}");
    Ok(())
}
