use state_machines::state_machine;

state_machine! {
    name: IngestionMachine,
    state: IngestionState,
    initial: Ready,
    states: [Ready, Validated, OwnerResolved, TextExtracted, Segmented, Archived, Analyzed, Parsed, Persisted],
    events {
        validate { transition: { from: Ready, to: Validated } }
        identify { transition: { from: Validated, to: OwnerResolved } }
        extract { transition: { from: OwnerResolved, to: TextExtracted } }
        segment { transition: { from: TextExtracted, to: Segmented } }
        archive { transition: { from: Segmented, to: Archived } }
        analyze { transition: { from: Archived, to: Analyzed } }
        parse { transition: { from: Analyzed, to: Parsed } }
        persist { transition: { from: Parsed, to: Persisted } }
    }
}

pub fn ready() -> IngestionMachine<(), Ready> {
    IngestionMachine::new(())
}
