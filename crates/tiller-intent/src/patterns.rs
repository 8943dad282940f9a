//! Signal pattern tables for intent classification.
//!
//! Every table is a set of regexes with a strength in 0..=1. Scoring takes
//! the strongest match per table, so adding patterns never inflates a signal
//! past its strongest member. Compiled once and reused.

use regex::Regex;

use crate::classifier::ActionKind;

/// A compiled regex with its signal strength.
pub struct SignalPattern {
    pub regex: Regex,
    pub strength: f64,
}

/// An action verb pattern carrying the action kind it suggests.
pub struct VerbPattern {
    pub regex: Regex,
    pub strength: f64,
    pub kind: ActionKind,
}

/// An explicit command pattern mapped to the action it requests.
pub struct CommandPattern {
    pub regex: Regex,
    pub kind: ActionKind,
}

/// All signal tables, compiled once and reused across classifications.
pub struct PatternLibrary {
    pub temporal: Vec<SignalPattern>,
    pub obligation: Vec<SignalPattern>,
    pub action_verbs: Vec<VerbPattern>,
    pub market: Vec<SignalPattern>,
    pub reminder: Vec<SignalPattern>,
    pub first_person: Vec<SignalPattern>,
    pub explicit_commands: Vec<CommandPattern>,
    pub informational: Vec<SignalPattern>,
    pub code_request: Vec<SignalPattern>,
    pub question: Vec<SignalPattern>,
    pub greeting: Vec<SignalPattern>,
    pub completion: Vec<SignalPattern>,
    pub event_words: Regex,
    pub deadline_words: Regex,
}

fn compile(table: &[(&str, f64)], what: &str) -> Vec<SignalPattern> {
    table
        .iter()
        .map(|(pat, strength)| SignalPattern {
            regex: Regex::new(pat).unwrap_or_else(|_| panic!("Invalid {} regex", what)),
            strength: *strength,
        })
        .collect()
}

impl Default for PatternLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternLibrary {
    /// Compile the full pattern library.
    pub fn new() -> Self {
        // =====================================================================
        // Positive signals
        // =====================================================================
        let temporal: Vec<(&str, f64)> = vec![
            (r"(?i)\btoday\b", 0.8),
            (r"(?i)\btomorrow\b", 0.9),
            (r"(?i)\bday after tomorrow\b", 0.9),
            (r"(?i)\bnext (?:week|month|year)\b", 0.8),
            (r"(?i)\bthis (?:week|month|evening|afternoon|morning)\b", 0.7),
            (r"(?i)\bin \d+ (?:days?|hours?|minutes?|weeks?)\b", 0.9),
            (
                r"(?i)\bby (?:tomorrow|tonight|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
                0.9,
            ),
            (r"(?i)\bat \d{1,2}(?::\d{2})?\s*(?:am|pm)?\b", 0.8),
            (
                r"(?i)\bon (?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
                0.8,
            ),
            (r"(?i)\bdue\b", 0.9),
            (r"(?i)\bdeadline\b", 0.9),
            (r"(?i)\bsoon\b", 0.5),
            (r"(?i)\blater\b", 0.4),
        ];

        let obligation: Vec<(&str, f64)> = vec![
            (r"(?i)\bi need to\b", 0.9),
            (r"(?i)\bi have to\b", 0.9),
            (r"(?i)\bi must\b", 0.95),
            (r"(?i)\bi gotta\b", 0.85),
            (r"(?i)\bi should\b", 0.7),
            (r"(?i)\bi ought to\b", 0.7),
        ];

        // Verb, strength, suggested action kind.
        let verbs: Vec<(&str, f64, ActionKind)> = vec![
            // High-commitment actions
            ("submit", 0.9, ActionKind::Task),
            ("complete", 0.9, ActionKind::Task),
            ("finish", 0.9, ActionKind::Task),
            ("deliver", 0.9, ActionKind::Task),
            ("pay", 0.85, ActionKind::Task),
            ("buy", 0.85, ActionKind::Task),
            ("purchase", 0.85, ActionKind::Task),
            ("order", 0.8, ActionKind::Task),
            ("apply", 0.85, ActionKind::Task),
            ("register", 0.8, ActionKind::Task),
            ("renew", 0.8, ActionKind::Task),
            ("fix", 0.85, ActionKind::Task),
            ("repair", 0.85, ActionKind::Task),
            ("prepare", 0.8, ActionKind::Task),
            ("write", 0.7, ActionKind::Task),
            ("create", 0.75, ActionKind::Task),
            ("make", 0.7, ActionKind::Task),
            ("clean", 0.75, ActionKind::Task),
            ("wash", 0.75, ActionKind::Task),
            ("organize", 0.75, ActionKind::Task),
            ("pick up", 0.8, ActionKind::Task),
            ("drop off", 0.8, ActionKind::Task),
            ("schedule", 0.8, ActionKind::Task),
            ("book", 0.8, ActionKind::Task),
            // Communication, can be task or reminder
            ("call", 0.75, ActionKind::Reminder),
            ("email", 0.75, ActionKind::Reminder),
            ("contact", 0.7, ActionKind::Reminder),
            ("reach out", 0.7, ActionKind::Reminder),
            ("visit", 0.7, ActionKind::Reminder),
            ("meet", 0.8, ActionKind::Event),
            ("attend", 0.8, ActionKind::Event),
            ("join", 0.75, ActionKind::Event),
            // Movement
            ("go", 0.75, ActionKind::Task),
            ("come", 0.6, ActionKind::Task),
            ("drive", 0.65, ActionKind::Task),
            ("walk", 0.5, ActionKind::Task),
        ];
        let action_verbs = verbs
            .iter()
            .map(|(verb, strength, kind)| VerbPattern {
                regex: Regex::new(&format!(r"(?i)\b{}\b", regex::escape(verb)))
                    .expect("Invalid action verb regex"),
                strength: *strength,
                kind: *kind,
            })
            .collect();

        let market: Vec<(&str, f64)> = vec![
            (
                r"(?i)\bgo\s+(?:to|at)\s+(?:the\s+)?(?:market|store|shop|mall|grocery|supermarket)\b",
                0.85,
            ),
            (
                r"(?i)\bgo\s+(?:to|at)\s+(?:the\s+)?(?:market|store|shop)\s+(?:to|and)\s+(?:buy|get|purchase)\b",
                0.95,
            ),
            (
                r"(?i)\bbuy\s+(?:some\s+)?\w+\s+(?:from|at)\s+(?:the\s+)?(?:market|store|shop)\b",
                0.90,
            ),
            (
                r"(?i)\bget\s+(?:some\s+)?\w+\s+(?:from|at)\s+(?:the\s+)?(?:market|store|shop)\b",
                0.85,
            ),
            (
                r"(?i)\bneed\s+(?:to\s+)?(?:buy|get|purchase)\s+\w+\s+(?:from|at)\b",
                0.90,
            ),
        ];

        let reminder: Vec<(&str, f64)> = vec![
            (r"(?i)\bremind me\b", 1.0),
            (r"(?i)\bremind me to\b", 1.0),
            (r"(?i)\bremind me about\b", 1.0),
            (r"(?i)\bset a reminder\b", 1.0),
            (r"(?i)\bdon'?t forget\b", 0.9),
            (r"(?i)\bremember to\b", 0.9),
            (r"(?i)\bping me\b", 0.85),
            (r"(?i)\bnotify me\b", 0.85),
        ];

        let first_person: Vec<(&str, f64)> = vec![
            (r"(?i)\bi\s+(?:need|have|must|should|want|will|am going to)\b", 0.8),
            (r"(?i)\bmy\s+(?:task|reminder|appointment|meeting)\b", 0.7),
        ];

        // =====================================================================
        // Explicit commands (short-circuit the scoring pipeline)
        // =====================================================================
        let commands: Vec<(&str, ActionKind)> = vec![
            (r"(?i)\bcreate a (?:task|reminder)\b", ActionKind::Task),
            (r"(?i)\badd a (?:task|reminder|todo)\b", ActionKind::Task),
            (r"(?i)\bmake a (?:task|reminder)\b", ActionKind::Task),
            (r"(?i)\bset (?:up )?a reminder\b", ActionKind::Reminder),
            (
                r"(?i)\badd (?:this|it) to my (?:tasks|list|reminders)\b",
                ActionKind::Task,
            ),
        ];
        let explicit_commands = commands
            .iter()
            .map(|(pat, kind)| CommandPattern {
                regex: Regex::new(pat).expect("Invalid explicit command regex"),
                kind: *kind,
            })
            .collect();

        // =====================================================================
        // Anti-signals
        // =====================================================================
        let informational: Vec<(&str, f64)> = vec![
            (r"(?i)\bexplain\b", 0.9),
            (r"(?i)\bhow (?:do|can|to|does)\b", 0.9),
            (r"(?i)\bwhat (?:is|are|does|means?)\b", 0.85),
            (r"(?i)\bwhy (?:is|are|does|do)\b", 0.85),
            (r"(?i)\btell me about\b", 0.8),
            (r"(?i)\bdescribe\b", 0.8),
            (r"(?i)\bdefine\b", 0.8),
        ];

        let code_request: Vec<(&str, f64)> = vec![
            (
                r"(?i)\bwrite\s+(?:me\s+)?(?:some\s+)?(?:code|a\s+(?:function|script|program))\b",
                0.9,
            ),
            (r"(?i)\bgenerate\s+(?:code|a\s+script)\b", 0.9),
            (
                r"(?i)\bcode\s+(?:in|using)\s+(?:python|javascript|js|java|c\+\+|go|ruby)\b",
                0.9,
            ),
            (
                r"(?i)\bimplement\s+(?:binary\s+search|a\s+function|an\s+algorithm)\b",
                0.85,
            ),
            (
                r"(?i)\b(?:binary\s+search|quick\s+sort|merge\s+sort|algorithm)\b",
                0.7,
            ),
        ];

        let question: Vec<(&str, f64)> = vec![
            // Ends with a question mark
            (r"(?i)^[\w\s]+\?\s*$", 0.8),
            (
                r"(?i)\b(?:can you|could you|would you)\s+(?:help|tell|explain|show)\b",
                0.8,
            ),
            (r"(?i)\bdo you\s+(?:know|think|believe)\b", 0.7),
            (r"(?i)\bis it\s+(?:possible|true|correct)\b", 0.7),
        ];

        let greeting: Vec<(&str, f64)> = vec![
            (
                r"(?i)^(?:hello|hi|hey|good morning|good afternoon|good evening)[\s!]*$",
                0.9,
            ),
            (r"(?i)\b(?:thanks|thank you|thx)\b", 0.7),
            (r"(?i)\b(?:bye|goodbye|see you)\b", 0.7),
        ];

        // Completion reports are scored so they show up in the breakdown, but
        // they carry no weight in the confidence sum.
        let completion: Vec<(&str, f64)> = vec![
            (
                r"(?i)\b(?:already|just)\s+(?:finished|completed|did|done)\b",
                0.9,
            ),
            (r"(?i)\b(?:finished|completed)\s+(?:the|my|this|that)\b", 0.85),
        ];

        let event_words = Regex::new(r"(?i)\b(?:meeting|appointment|call|interview|session)\b")
            .expect("Invalid event words regex");
        let deadline_words = Regex::new(r"(?i)\b(?:due|deadline|submit|assignment)\b")
            .expect("Invalid deadline words regex");

        Self {
            temporal: compile(&temporal, "temporal"),
            obligation: compile(&obligation, "obligation"),
            action_verbs,
            market: compile(&market, "market"),
            reminder: compile(&reminder, "reminder"),
            first_person: compile(&first_person, "first person"),
            explicit_commands,
            informational: compile(&informational, "informational"),
            code_request: compile(&code_request, "code request"),
            question: compile(&question, "question"),
            greeting: compile(&greeting, "greeting"),
            completion: compile(&completion, "completion"),
            event_words,
            deadline_words,
        }
    }

    /// Strongest matching pattern in a table, or 0.0 when nothing matches.
    pub fn max_strength(table: &[SignalPattern], text: &str) -> f64 {
        table
            .iter()
            .filter(|p| p.regex.is_match(text))
            .map(|p| p.strength)
            .fold(0.0, f64::max)
    }

    /// Strongest matching action verb and the action kind it suggests.
    ///
    /// Strictly-greater comparison keeps the first verb on strength ties,
    /// so table order is part of the contract.
    pub fn best_action_verb(&self, text: &str) -> (f64, ActionKind) {
        let mut best = 0.0;
        let mut kind = ActionKind::None;
        for verb in &self.action_verbs {
            if verb.regex.is_match(text) && verb.strength > best {
                best = verb.strength;
                kind = verb.kind;
            }
        }
        (best, kind)
    }

    /// First explicit command pattern matching the text, with the matched span.
    pub fn explicit_command<'a>(&self, text: &'a str) -> Option<(&'a str, ActionKind)> {
        for cmd in &self.explicit_commands {
            if let Some(m) = cmd.regex.find(text) {
                return Some((m.as_str(), cmd.kind));
            }
        }
        None
    }
}
