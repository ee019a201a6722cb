//! Long-running and observational checks for the dining table.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use foundation_simulations::config::{DelayRange, DiningConfig};
use foundation_simulations::dining_table::{
    fork_order, DiningEvent, DiningSimulation, DiningTable, PhilosopherState,
};
use serial_test::serial;

fn fast_table(philosophers: usize) -> DiningConfig {
    DiningConfig::default()
        .with_philosophers(philosophers)
        .with_think_delay(DelayRange::instant())
        .with_eat_delay(DelayRange::from_millis(0, 1))
}

fn assert_table_is_consistent(table: &DiningTable) {
    let count = table.philosophers();
    let snapshot = table.snapshot();
    let (states, holders) = (snapshot.states, snapshot.fork_holders);

    for (id, state) in states.iter().enumerate() {
        if *state == PhilosopherState::Eating {
            let (first, second) = fork_order(id, count);
            assert_eq!(holders[first], Some(id), "eating without fork {first}");
            assert_eq!(holders[second], Some(id), "eating without fork {second}");
            assert_ne!(
                states[(id + 1) % count],
                PhilosopherState::Eating,
                "neighbours {id} and {} eat together",
                (id + 1) % count
            );
        }
    }
}

#[test]
#[serial]
#[ntest::timeout(30000)]
fn test_randomized_tables_never_stall() {
    for philosophers in 2..=7 {
        let mut simulation =
            DiningSimulation::new(fast_table(philosophers)).expect("should build");
        let table = simulation.table().clone();
        simulation.start().expect("should start");

        let mut last_total = 0;
        for _ in 0..5 {
            thread::sleep(Duration::from_millis(60));
            let total = table.total_meals();
            assert!(
                total > last_total,
                "{philosophers} philosophers stalled at {total} meals"
            );
            last_total = total;
        }

        simulation.shutdown().expect("should shut down");
    }
}

#[test]
#[serial]
#[ntest::timeout(20000)]
fn test_no_neighbours_ever_eat_together() {
    let mut simulation = DiningSimulation::new(fast_table(5)).expect("should build");
    let table = simulation.table().clone();
    let watching = Arc::new(AtomicBool::new(true));

    let watcher_table = table.clone();
    let watcher_flag = watching.clone();
    let watcher = thread::spawn(move || {
        let mut samples = 0_usize;
        while watcher_flag.load(Ordering::Acquire) {
            assert_table_is_consistent(&watcher_table);
            samples += 1;
        }
        samples
    });

    simulation.start().expect("should start");
    thread::sleep(Duration::from_millis(300));
    simulation.shutdown().expect("should shut down");

    watching.store(false, Ordering::Release);
    assert!(watcher.join().expect("should safely join") > 0);
    assert!(table.total_meals() > 0);
}

#[test]
#[serial]
#[ntest::timeout(20000)]
fn test_fork_events_replay_to_a_consistent_table() {
    let philosophers = 4;
    let mut simulation = DiningSimulation::new(fast_table(philosophers)).expect("should build");
    let events = simulation.subscribe();
    simulation.start().expect("should start");

    thread::sleep(Duration::from_millis(200));
    simulation.shutdown().expect("should shut down");

    let mut forks = vec![false; philosophers];
    let mut states = vec![PhilosopherState::Thinking; philosophers];
    let mut meals = 0;
    for event in events {
        match event {
            DiningEvent::ForkState { fork, held } => {
                assert_ne!(forks[fork], held, "fork {fork} changed to the state it was in");
                forks[fork] = held;
            }
            DiningEvent::PhilosopherState { id, state } => {
                if state == PhilosopherState::Eating {
                    let (first, second) = fork_order(id, philosophers);
                    assert!(forks[first] && forks[second]);
                    meals += 1;
                }
                states[id] = state;
            }
        }
    }

    assert!(meals > 0);
    assert!(forks.iter().all(|held| !held), "every fork is back on the table");
    assert!(states.iter().all(|state| *state == PhilosopherState::Thinking));
}

#[test]
#[ntest::timeout(5000)]
fn test_two_philosophers_alternate() {
    let table = Arc::new(DiningTable::new(2).expect("should build"));

    let handles: Vec<_> = (0..2)
        .map(|id| {
            let table = table.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    table.pick_up_forks(id).expect("table is open");
                    table.put_down_forks(id);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("should safely join");
    }
    assert_eq!(table.meals_eaten(0), 200);
    assert_eq!(table.meals_eaten(1), 200);
    assert_eq!(table.fork_holders(), vec![None, None]);
}
