use std::collections::VecDeque;

pub const HISTORY_CAP: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
}

/// Bounded FIFO of completed turns. Owned by the session; only appended
/// to after a turn fully succeeds.
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    turns: VecDeque<ChatTurn>,
    capacity: usize,
}

impl ChatHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, question: String, answer: String) {
        self.turns.push_back(ChatTurn { question, answer });
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Oldest first.
    pub fn turns(&self) -> impl Iterator<Item = &ChatTurn> {
        self.turns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_most_recent_turns_in_order() {
        let mut history = ChatHistory::new(10);
        for i in 0..15 {
            history.push(format!("pergunta {i}"), format!("resposta {i}"));
        }

        assert_eq!(history.len(), 10);
        let questions: Vec<String> = history.turns().map(|t| t.question.clone()).collect();
        let expected: Vec<String> = (5..15).map(|i| format!("pergunta {i}")).collect();
        assert_eq!(questions, expected);
    }

    #[test]
    fn capacity_has_a_floor_of_one() {
        let mut history = ChatHistory::new(0);
        history.push("a".into(), "b".into());
        history.push("c".into(), "d".into());
        assert_eq!(history.len(), 1);
        assert_eq!(history.turns().next().unwrap().question, "c");
    }
}
