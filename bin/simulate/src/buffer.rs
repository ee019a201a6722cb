use foundation_simulations::ProducerConsumerSimulation;

use crate::observer;
use crate::BoxedError;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(observer::with_run_args(
        clap::Command::new("buffer")
            .about("one producer and one consumer sharing a bounded ring of slots"),
    ))
}

pub fn run(args: &clap::ArgMatches) -> std::result::Result<(), BoxedError> {
    let options = observer::prepare(args)?;

    let mut simulation = ProducerConsumerSimulation::new(options.config.buffer)?;
    let events = simulation.subscribe();
    simulation.start()?;

    observer::watch(&events, options.duration)?;

    let buffer = simulation.buffer().clone();
    simulation.shutdown()?;
    observer::flush(events);

    println!(
        "produced={} consumed={} left_in_buffer={}",
        buffer.produced(),
        buffer.consumed(),
        buffer.occupied()
    );
    Ok(())
}
