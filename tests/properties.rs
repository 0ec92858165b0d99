use automata::simulation::{PdaConfiguration, TmConfiguration};
use automata::{ExampleCatalog, Machine, Simulation, Status};
use proptest::prelude::*;

const STEP_LIMIT: usize = 64;

fn example(title: &str) -> Machine {
    ExampleCatalog::by_title(title)
        .and_then(|example| example.machine())
        .expect("embedded example compiles")
}

fn word(alphabet: &'static str, max: usize) -> impl Strategy<Value = String> {
    let letters: Vec<char> = alphabet.chars().collect();
    prop::collection::vec(prop::sample::select(letters), 0..max)
        .prop_map(|letters| letters.into_iter().collect())
}

fn pda_configurations(simulation: &Simulation) -> Vec<PdaConfiguration> {
    let Simulation::Pda(pda) = simulation else {
        panic!("expected a pushdown automaton");
    };
    pda.frontier()
        .iter()
        .chain(pda.accepted())
        .chain(pda.rejected())
        .cloned()
        .collect()
}

fn tm_frontier(simulation: &Simulation) -> Vec<TmConfiguration> {
    let Simulation::Tm(tm) = simulation else {
        panic!("expected a Turing machine");
    };
    tm.frontier().iter().chain(tm.accepted()).cloned().collect()
}

proptest! {
    #[test]
    fn pda_stacks_are_never_empty(input in word("ab", 8)) {
        let machine = example("NPDA Empty Stack");
        let mut simulation = Simulation::new(&machine, &input);

        for _ in 0..STEP_LIMIT {
            for configuration in pda_configurations(&simulation) {
                prop_assert!(!configuration.stack().is_empty());
            }
            if simulation.step().is_terminal() {
                break;
            }
        }
    }

    #[test]
    fn tm_tape_never_shrinks_and_head_stays_on_it(input in word("abc", 8)) {
        let machine = example("TM");
        let mut simulation = Simulation::new(&machine, &input);
        let mut longest = input.chars().count().max(1);

        for _ in 0..STEP_LIMIT {
            for configuration in tm_frontier(&simulation) {
                prop_assert!(configuration.tape().len() >= longest);
                prop_assert!(configuration.head() < configuration.tape().len());
                longest = configuration.tape().len();
            }
            if simulation.step().is_terminal() {
                break;
            }
        }
    }

    #[test]
    fn fresh_simulations_agree(input in word("1", 12)) {
        let machine = example("NFA");
        let mut first = Simulation::new(&machine, &input);
        let mut second = Simulation::new(&machine, &input);

        for _ in 0..STEP_LIMIT {
            prop_assert_eq!(first.snapshot(), second.snapshot());
            let status = first.step();
            prop_assert_eq!(status, second.step());
            if status.is_terminal() {
                break;
            }
        }
    }

    #[test]
    fn terminal_status_is_final(input in word("ab", 8)) {
        let machine = example("DPDA Empty Stack");
        let mut simulation = Simulation::new(&machine, &input);
        let status = simulation.run(STEP_LIMIT);
        prop_assert!(status.is_terminal());

        let settled = simulation.snapshot();
        for _ in 0..3 {
            prop_assert_eq!(simulation.step(), status);
            prop_assert_eq!(simulation.snapshot(), settled.clone());
        }
    }

    #[test]
    fn accepting_matches_language(n in 0usize..6, k in 0usize..6) {
        let machine = example("DPDA Empty Stack");
        let input = format!("{}{}", "a".repeat(n), "b".repeat(k));
        let mut simulation = Simulation::new(&machine, &input);
        let expected = if n == k { Status::Accept } else { Status::Reject };
        prop_assert_eq!(simulation.run(STEP_LIMIT), expected);
    }
}
