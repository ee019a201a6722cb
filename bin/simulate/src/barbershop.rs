use foundation_simulations::BarbershopSimulation;

use crate::observer;
use crate::BoxedError;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(observer::with_run_args(
        clap::Command::new("barbershop")
            .about("a sleeping barber, a bounded waiting room and a stream of customers"),
    ))
}

pub fn run(args: &clap::ArgMatches) -> std::result::Result<(), BoxedError> {
    let options = observer::prepare(args)?;

    let mut simulation = BarbershopSimulation::new(options.config.barbershop)?;
    let events = simulation.subscribe();
    simulation.start()?;

    observer::watch(&events, options.duration)?;

    let shop = simulation.shop().clone();
    simulation.shutdown()?;
    observer::flush(events);

    println!(
        "served={} turned_away={}",
        shop.served(),
        shop.turned_away()
    );
    Ok(())
}
