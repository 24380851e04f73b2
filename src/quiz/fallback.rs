//! Bundled local question pool.
//!
//! Used when the external fetch fails or a room has no quiz id, and to pad
//! entry quizzes when the fetched pool is too small after validation.

use crate::protocol::Question;

/// The bundled fallback questions.
pub fn local_pool() -> Vec<Question> {
    let raw: &[(&str, &[&str], usize)] = &[
        ("What is 7 x 8?", &["54", "56", "64", "48"], 1),
        ("Which planet is closest to the sun?", &["Venus", "Earth", "Mercury", "Mars"], 2),
        ("What is the capital of France?", &["Lyon", "Marseille", "Paris", "Nice"], 2),
        ("How many sides does a hexagon have?", &["5", "6", "7", "8"], 1),
        ("What gas do plants absorb from the air?", &["Oxygen", "Nitrogen", "Carbon dioxide", "Helium"], 2),
        ("What is 15% of 200?", &["25", "30", "35", "40"], 1),
        ("Which ocean is the largest?", &["Atlantic", "Indian", "Arctic", "Pacific"], 3),
        ("What is the square root of 144?", &["10", "11", "12", "14"], 2),
        ("How many continents are there?", &["5", "6", "7", "8"], 2),
        ("What is the chemical symbol for gold?", &["Go", "Gd", "Au", "Ag"], 2),
        ("Which number is prime?", &["21", "33", "37", "39"], 2),
        ("What is 9 squared?", &["72", "81", "91", "99"], 1),
        ("How many minutes are in two hours?", &["60", "90", "120", "150"], 2),
        ("Which animal is a mammal?", &["Shark", "Dolphin", "Trout", "Eel"], 1),
        ("What is the freezing point of water in Celsius?", &["-10", "0", "10", "32"], 1),
        ("How many legs does a spider have?", &["6", "8", "10", "12"], 1),
    ];

    raw.iter()
        .enumerate()
        .map(|(i, (text, options, correct))| Question {
            id: format!("local_{i}"),
            text: (*text).to_string(),
            options: options.iter().map(|o| (*o).to_string()).collect(),
            correct_index: *correct,
            images: Vec::new(),
        })
        .collect()
}
