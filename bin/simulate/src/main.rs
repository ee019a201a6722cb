mod barbershop;
mod buffer;
mod dining;
mod observer;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn main() -> std::result::Result<(), BoxedError> {
    let commander = dining::register(barbershop::register(buffer::register(
        clap::Command::new("simulate")
            .about("Runs a classic synchronization problem and prints its events")
            .arg_required_else_help(true),
    )));

    let matches = commander.get_matches();
    match matches.subcommand() {
        Some(("buffer", arguments)) => buffer::run(arguments)?,
        Some(("barbershop", arguments)) => barbershop::run(arguments)?,
        Some(("dining", arguments)) => dining::run(arguments)?,
        _ => {}
    }

    Ok(())
}
