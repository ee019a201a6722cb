use foundation_simulations::DiningSimulation;

use crate::observer;
use crate::BoxedError;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(observer::with_run_args(
        clap::Command::new("dining")
            .about("philosophers sharing a ring of forks, lower fork first"),
    ))
}

pub fn run(args: &clap::ArgMatches) -> std::result::Result<(), BoxedError> {
    let options = observer::prepare(args)?;

    let mut simulation = DiningSimulation::new(options.config.dining)?;
    let events = simulation.subscribe();
    simulation.start()?;

    observer::watch(&events, options.duration)?;

    let table = simulation.table().clone();
    simulation.shutdown()?;
    observer::flush(events);

    let meals: Vec<String> = (0..table.philosophers())
        .map(|id| format!("{id}:{}", table.meals_eaten(id)))
        .collect();
    println!("meals_eaten {}", meals.join(" "));
    Ok(())
}
