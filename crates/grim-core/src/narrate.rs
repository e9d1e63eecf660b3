//! First-person to third-person rewriting for party broadcasts.
//!
//! The acting participant sees "You attack the troll." locally; everyone
//! else in the party should read "Mara attacks the troll.". This is a
//! best-effort presentation transform, not a grammar engine: the verb
//! conjugation heuristic covers the regular cases and a short irregular
//! list, and passes anything else through untouched.

/// Rewrite one captured first-person line into third person for `actor`.
///
/// Lines that don't start with a second-person pronoun are returned as-is
/// (monster narration is already third person). Possessives ("Your") become
/// "<actor>'s"; object-position "you" becomes the actor's name.
pub fn to_third_person(line: &str, actor: &str) -> String {
    if let Some(rest) = line.strip_prefix("You ") {
        let mut words = rest.splitn(2, ' ');
        let verb = words.next().unwrap_or("");
        let tail = words.next();
        let conjugated = conjugate(verb);
        let mut out = format!("{actor} {conjugated}");
        if let Some(tail) = tail {
            out.push(' ');
            out.push_str(&replace_object_pronouns(tail, actor));
        }
        out
    } else if let Some(rest) = line.strip_prefix("Your ") {
        format!("{actor}'s {}", replace_object_pronouns(rest, actor))
    } else {
        replace_object_pronouns(line, actor)
    }
}

/// Rewrite a whole captured buffer.
pub fn rewrite_capture(lines: &[String], actor: &str) -> Vec<String> {
    lines.iter().map(|l| to_third_person(l, actor)).collect()
}

/// Mid-sentence "you"/"your" referring to the actor.
fn replace_object_pronouns(text: &str, actor: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut first = true;
    for word in text.split(' ') {
        if !first {
            out.push(' ');
        }
        first = false;
        let (core, punct) = split_trailing_punct(word);
        match core {
            "you" => {
                out.push_str(actor);
                out.push_str(punct);
            }
            "your" => {
                out.push_str(actor);
                out.push_str("'s");
                out.push_str(punct);
            }
            _ => out.push_str(word),
        }
    }
    out
}

fn split_trailing_punct(word: &str) -> (&str, &str) {
    let trimmed = word.trim_end_matches(|c: char| c.is_ascii_punctuation());
    (trimmed, &word[trimmed.len()..])
}

/// Second-person verb -> third-person singular.
///
/// Heuristic: irregulars first, then "-ed"/"-ly" passthrough (past tense and
/// adverbs don't conjugate), then sibilant endings get "es", consonant+y
/// becomes "ies", everything else gets "s".
fn conjugate(verb: &str) -> String {
    match verb {
        "are" => return "is".into(),
        "have" => return "has".into(),
        "were" => return "was".into(),
        "do" => return "does".into(),
        "go" => return "goes".into(),
        // Modals never take an -s.
        "can" | "cannot" | "can't" | "will" | "won't" | "must" | "may" | "might"
        | "would" | "should" | "could" => return verb.into(),
        _ => {}
    }

    if verb.is_empty() || verb.ends_with("ed") || verb.ends_with("ly") {
        return verb.into();
    }

    if verb.ends_with('s')
        || verb.ends_with('x')
        || verb.ends_with('z')
        || verb.ends_with("ch")
        || verb.ends_with("sh")
    {
        return format!("{verb}es");
    }

    if let Some(stem) = verb.strip_suffix('y') {
        let before_y = stem.chars().last();
        if let Some(c) = before_y {
            if !matches!(c, 'a' | 'e' | 'i' | 'o' | 'u') {
                return format!("{stem}ies");
            }
        }
    }

    format!("{verb}s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_attack_line() {
        assert_eq!(
            to_third_person("You attack the troll.", "Mara"),
            "Mara attacks the troll."
        );
    }

    #[test]
    fn test_sibilant_verbs() {
        assert_eq!(
            to_third_person("You slash wildly!", "Mara"),
            "Mara slashes wildly!"
        );
        assert_eq!(to_third_person("You fix it.", "Mara"), "Mara fixes it.");
    }

    #[test]
    fn test_consonant_y_verb() {
        assert_eq!(
            to_third_person("You parry the blow.", "Korr"),
            "Korr parries the blow."
        );
    }

    #[test]
    fn test_ed_and_ly_passthrough() {
        // Past tense narration should not grow an extra -s.
        assert_eq!(
            to_third_person("You missed the goblin.", "Mara"),
            "Mara missed the goblin."
        );
    }

    #[test]
    fn test_irregular_verbs() {
        assert_eq!(to_third_person("You are stunned!", "Mara"), "Mara is stunned!");
        assert_eq!(
            to_third_person("You have the upper hand.", "Mara"),
            "Mara has the upper hand."
        );
        assert_eq!(
            to_third_person("You cannot escape!", "Mara"),
            "Mara cannot escape!"
        );
    }

    #[test]
    fn test_possessive_prefix() {
        assert_eq!(
            to_third_person("Your spell fizzles.", "Vex"),
            "Vex's spell fizzles."
        );
    }

    #[test]
    fn test_object_pronoun_mid_sentence() {
        assert_eq!(
            to_third_person("The troll claws you!", "Mara"),
            "The troll claws Mara!"
        );
        assert_eq!(
            to_third_person("The curse saps your strength.", "Mara"),
            "The curse saps Mara's strength."
        );
    }

    #[test]
    fn test_third_person_line_untouched() {
        assert_eq!(
            to_third_person("The troll falls!", "Mara"),
            "The troll falls!"
        );
    }

    #[test]
    fn test_rewrite_capture() {
        let lines = vec![
            "You swing at the wolf.".to_string(),
            "The wolf bites you!".to_string(),
        ];
        let out = rewrite_capture(&lines, "Dain");
        assert_eq!(out[0], "Dain swings at the wolf.");
        assert_eq!(out[1], "The wolf bites Dain!");
    }
}
