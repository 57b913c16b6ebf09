use crate::scenario::ToolCallRecord;

/// Returns `true` if `actual` holds as many calls as `expected`, and every
/// expected call has an actual call with the same name and arguments.
///
/// Order doesn't matter. Matching isn't one-to-one, so two identical
/// expected calls are satisfied by one actual call plus any other.
pub fn tool_calls_match(
    expected: &[ToolCallRecord],
    actual: &[ToolCallRecord],
) -> bool {
    if expected.len() != actual.len() {
        return false;
    }
    expected.iter().all(|exp| {
        actual
            .iter()
            .any(|act| act.name == exp.name && act.args == exp.args)
    })
}
