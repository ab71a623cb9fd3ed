use stacks_event_observer::cli;

pub fn main() {
    cli::main();
}
