//! Reverse parsing back into the parser
use crowd_input::console::{Console, ConsoleRegistry};
use crowd_input::exercise::{compare_exercise, generate_exercise, ExerciseOptions};
use crowd_input::parser::{parse, ParserOptions};
use crowd_input::reverse::{
    reverse_parse, reverse_parse_natural, ReverseParserOptions, ShowDurationTypes, ShowPortTypes,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

fn console(name: &str) -> Arc<Console> {
    let mut registry = ConsoleRegistry::new();
    registry.add_embedded_consoles();
    registry.get_console(name).cloned().expect("embedded console")
}

#[test]
fn test_compact_round_trip() {
    let n64 = console("n64");
    let options = ParserOptions::default();
    let inputs = [
        "a",
        "a200ms+b_ #500ms",
        "&2left30%2s+z_ cup1500ms z- .",
        "-r _l start5s",
        "up+down+left+right",
        "dleft dright,dup ddown",
    ];

    for (show_ports, show_durations) in [
        (ShowPortTypes::ShowNonDefaultPorts, ShowDurationTypes::ShowNonDefaultDurations),
        (ShowPortTypes::ShowAllPorts, ShowDurationTypes::ShowAllDurations),
    ] {
        let reverse = ReverseParserOptions {
            show_ports,
            show_durations,
            ..ReverseParserOptions::matching(&options)
        };

        for text in inputs {
            let first = parse(text, &n64, &options).expect("grammar");
            assert!(first.is_valid(), "{text}: {:?}", first.error);

            let rendered = reverse_parse(&first, &n64, &reverse);
            let second = parse(&rendered, &n64, &options).expect("grammar");
            assert_eq!(first, second, "{text} rendered as {rendered}");
        }
    }
}

#[test]
fn test_natural_sentence_for_snes() {
    let snes = console("snes");
    let sequence = parse("a+b_ #1s b-", &snes, &ParserOptions::default()).expect("grammar");

    assert_eq!(
        reverse_parse_natural(&sequence, &snes, &ReverseParserOptions::default()),
        "Press \"a\" for 200 milliseconds and hold \"b\" for 200 milliseconds, \
         then release \"b\", then wait for 1 second, then release \"b\" for 200 milliseconds."
    );
}

#[test]
fn test_exercises_can_be_solved_on_every_embedded_console() {
    let parser_options = ParserOptions::default();
    let reverse = ReverseParserOptions::matching(&parser_options);
    let options = ExerciseOptions {
        user_level: 1,
        randomize_ports: true,
        controller_count: 2,
        ..ExerciseOptions::default()
    };

    for name in ["snes", "n64"] {
        let console = console(name);
        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let exercise = generate_exercise(&mut rng, &console, &options).expect("exercise");

            let answer = reverse_parse(&exercise, &console, &reverse);
            let attempt = parse(&answer, &console, &parser_options).expect("grammar");
            assert_eq!(
                compare_exercise(&exercise, &attempt, &console),
                Ok(()),
                "{name} seed {seed}: {answer}"
            );
        }
    }
}
