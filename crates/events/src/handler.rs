/// Decide-then-evolve an aggregate in memory (no persistence, no publication).
///
/// Used by domain tests and by services that fold staged events before
/// committing them. On error the aggregate is left untouched.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: comptoir_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
