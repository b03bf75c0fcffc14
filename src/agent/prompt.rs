//! Prompt assembly for the conversation engine.

use crate::agent::history::ChatHistory;
use crate::llm::ChatMessage;
use crate::rag::Chunk;

/// Fixed persona + grounding rule + action emission format. The model
/// must wrap any calendar command in an `<action>` block so extraction
/// never has to guess which braces are the payload.
pub fn system_instruction() -> String {
    "Você é Jarvis, um assistente virtual especializado em ajudar com a organização \
e otimização da rotina diária usando princípios essencialistas.\n\
\n\
Responda apenas com base no contexto fornecido, no histórico da conversa e nas \
informações do calendário. Se a informação não estiver no contexto, diga que não \
sabe a resposta com base nos documentos disponíveis.\n\
\n\
Você tem acesso à agenda do usuário e pode listar eventos, buscar eventos, criar \
eventos, atualizar eventos, excluir eventos e analisar tempo livre. Para executar \
uma dessas ações, inclua na resposta exatamente um bloco no formato:\n\
<action>{\"action_type\": \"list_events\", \"params\": {\"dias\": 7}}</action>\n\
Tipos de ação disponíveis: list_events, search_event, create_event, update_event, \
delete_event, analyze_free_time. Não inclua o bloco <action> quando nenhuma ação \
for necessária.\n\
\n\
Seja claro, objetivo e amigável. Responda sempre em português do Brasil."
        .to_string()
}

/// System instruction, then the history chronologically, then the user
/// message carrying the retrieved context and the question.
pub fn build_messages(
    context_chunks: &[Chunk],
    history: &ChatHistory,
    question: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(ChatMessage::system(system_instruction()));

    for turn in history.turns() {
        messages.push(ChatMessage::user(turn.question.clone()));
        messages.push(ChatMessage::assistant(turn.answer.clone()));
    }

    messages.push(ChatMessage::user(format!(
        "Contexto dos documentos:\n{}\n\nPergunta: {}",
        format_context(context_chunks),
        question
    )));

    messages
}

fn format_context(chunks: &[Chunk]) -> String {
    if chunks.is_empty() {
        return "Nenhum trecho relevante encontrado.".to_string();
    }

    chunks
        .iter()
        .map(|chunk| format!("[{}]\n{}", chunk.source, chunk.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, content: &str) -> Chunk {
        Chunk {
            id: format!("{source}:{content}"),
            content: content.to_string(),
            source: source.to_string(),
        }
    }

    #[test]
    fn messages_carry_system_history_and_question_in_order() {
        let mut history = ChatHistory::new(10);
        history.push("primeira pergunta".into(), "primeira resposta".into());

        let messages = build_messages(
            &[chunk("notas.md", "um trecho")],
            &history,
            "pergunta atual",
        );

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "primeira pergunta");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[3].role, "user");
        assert!(messages[3].content.contains("[notas.md]"));
        assert!(messages[3].content.contains("um trecho"));
        assert!(messages[3].content.ends_with("Pergunta: pergunta atual"));
    }

    #[test]
    fn empty_context_is_stated_explicitly() {
        let messages = build_messages(&[], &ChatHistory::new(10), "qualquer coisa");
        assert!(messages[1].content.contains("Nenhum trecho relevante encontrado."));
    }

    #[test]
    fn system_instruction_documents_the_action_format() {
        let instruction = system_instruction();
        assert!(instruction.contains("<action>"));
        assert!(instruction.contains("analyze_free_time"));
    }
}
