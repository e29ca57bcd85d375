//! Program-id matching over enriched instruction lists.

use crate::enriched::Instruction;

/// Whether `program_id` is invoked by a top-level instruction or by one of
/// their direct inner instructions.
///
/// Inner instructions are inspected only one level deep.
pub fn matches_program(instructions: &[Instruction], program_id: &str) -> bool {
    if instructions.iter().any(|ix| ix.program_id == program_id) {
        return true;
    }

    instructions
        .iter()
        .flat_map(|ix| ix.inner_instructions.iter())
        .any(|inner| inner.program_id == program_id)
}
