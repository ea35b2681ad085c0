#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StartScan,
    StopScan,
    PrintStatus,
    Quit,
    Nothing,
    PrintErr(&'static str),
}

pub struct Cmd {}

impl Cmd {
    pub fn new() -> Self {
        Self {}
    }

    pub fn parse_line(&mut self, line: &str) -> Action {
        use Action::*;

        let mut parts = line.split_whitespace();
        let action = match parts.next() {
            None => return Nothing,
            Some("start") => StartScan,
            Some("stop") => StopScan,
            Some("status") => PrintStatus,
            Some("quit") | Some("exit") => Quit,
            Some(_) => return PrintErr("Unknown command. Try start, stop, status or quit"),
        };
        if parts.next().is_some() {
            return PrintErr("Commands take no arguments");
        }
        action
    }
}

impl Default for Cmd {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn parses_commands() {
        let mut cmd = Cmd::new();
        assert_eq!(cmd.parse_line("start"), Action::StartScan);
        assert_eq!(cmd.parse_line("  stop \n"), Action::StopScan);
        assert_eq!(cmd.parse_line("status"), Action::PrintStatus);
        assert_eq!(cmd.parse_line("quit"), Action::Quit);
        assert_eq!(cmd.parse_line(""), Action::Nothing);
    }

    #[test]
    fn rejects_garbage() {
        let mut cmd = Cmd::new();
        assert!(matches!(cmd.parse_line("pan 30"), Action::PrintErr(_)));
        assert!(matches!(cmd.parse_line("start now"), Action::PrintErr(_)));
        assert!(matches!(cmd.parse_line("START"), Action::PrintErr(_)));
    }

    proptest! {
        #[test]
        fn unknown_words_are_rejected(word in "[a-z]{1,12}") {
            prop_assume!(!["start", "stop", "status", "quit", "exit"].contains(&word.as_str()));
            prop_assert!(matches!(Cmd::new().parse_line(&word), Action::PrintErr(_)));
        }

        #[test]
        fn commands_take_no_arguments(
            command in prop::sample::select(vec!["start", "stop", "status", "quit"]),
            arg in "[a-z0-9]{1,8}",
        ) {
            let line = format!("{} {}", command, arg);
            prop_assert!(matches!(Cmd::new().parse_line(&line), Action::PrintErr(_)));
        }
    }
}
