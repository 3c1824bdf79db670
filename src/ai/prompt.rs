//! Prompt templates for text and voice idea requests.

const IDEA_INSTRUCTION: &str = "Generate a creative business idea for a small team (2-5 people) where \
Artificial Intelligence is THE CORE PRODUCT, not just a feature. \
The AI should be the main value proposition and competitive advantage.";

/// System message for free-form voice requests.
pub const VOICE_SYSTEM_PROMPT: &str = "Ты - эксперт по AI-стартапам. Генерируешь конкретные, реалистичные идеи \
для небольших команд в России. Всегда отвечаешь в формате: ПРОБЛЕМА, РЕШЕНИЕ, МОНЕТИЗАЦИЯ, ROI с конкретными цифрами.";

/// Prompt for `/idea`, with the caller's topic appended verbatim.
pub fn idea_prompt(topic: Option<&str>) -> String {
    let mut prompt = IDEA_INSTRUCTION.to_string();
    if let Some(topic) = topic.filter(|t| !t.trim().is_empty()) {
        prompt.push_str("\n\nFocus on: ");
        prompt.push_str(topic);
    }
    prompt.push_str("\n\nBusiness idea:");
    prompt
}

/// Prompt embedding a transcribed voice request.
pub fn voice_prompt(request: &str) -> String {
    format!(
        r#"Пользователь попросил голосом: "{request}"

Сгенерируй AI-first бизнес-идею, учитывая его запрос.

ТРЕБОВАНИЯ:
- Команда 2-5 человек
- Стартовый бюджет до 500к₽
- MVP за 1-3 месяца
- Рынок России
- AI - это ЯДРО продукта, не просто функция

ФОРМАТ ОТВЕТА (СТРОГО):
🎯 ПРОБЛЕМА: [1-2 предложения] конкретная боль + цифры
💡 РЕШЕНИЕ: [1-2 предложения] конкретная AI-технология (GPT-4, YOLOv8, Whisper и т.д.)
💰 МОНЕТИЗАЦИЯ: [1 предложение] модель + чек в рублях
📈 ROI: [1 предложение] экономия клиента в рублях или часах

ЗАПРЕЩЕНО:
❌ Общие фразы без конкретики
❌ "Машинное обучение", "алгоритмы AI" без указания технологии
❌ Доллары ($) - только рубли (₽)

ПРИМЕР:
🎯 ПРОБЛЕМА: Рестораны тратят 20 часов/нед на составление меню и прогноз закупок, потери от порчи продуктов 15% выручки.
💡 РЕШЕНИЕ: GPT-4 анализирует продажи за год, погоду, события в городе и генерирует меню + список закупок на неделю за 5 минут.
💰 МОНЕТИЗАЦИЯ: SaaS 12к₽/мес за ресторан или 5к₽/мес для кафе.
📈 ROI: Экономия 20 часов/нед (100к₽ при ЗП шефа 200к₽) + снижение порчи на 10% (50к₽/мес) = 135к₽/мес экономии.

Твой ответ:"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idea_prompt_without_topic() {
        let prompt = idea_prompt(None);
        assert!(prompt.starts_with("Generate a creative business idea"));
        assert!(!prompt.contains("Focus on"));
        assert!(prompt.ends_with("\n\nBusiness idea:"));
    }

    #[test]
    fn test_idea_prompt_appends_topic_verbatim() {
        let prompt = idea_prompt(Some("Доставка еды"));
        assert!(prompt.contains("\n\nFocus on: Доставка еды\n\nBusiness idea:"));
    }

    #[test]
    fn test_blank_topic_is_ignored() {
        assert_eq!(idea_prompt(Some("  ")), idea_prompt(None));
    }

    #[test]
    fn test_voice_prompt_embeds_request() {
        let prompt = voice_prompt("придумай идею про доставку");
        assert!(prompt.starts_with("Пользователь попросил голосом: \"придумай идею про доставку\""));
        assert!(prompt.ends_with("Твой ответ:"));
    }

    #[test]
    fn test_voice_prompt_shows_worked_example() {
        let prompt = voice_prompt("придумай идею");
        let example = prompt.find("ПРИМЕР:").expect("example section");
        let answer = prompt.find("Твой ответ:").unwrap();
        assert!(prompt.find("ЗАПРЕЩЕНО:").unwrap() < example);
        assert!(example < answer);
        for label in ["🎯 ПРОБЛЕМА: Рестораны", "💡 РЕШЕНИЕ: GPT-4", "💰 МОНЕТИЗАЦИЯ: SaaS", "📈 ROI: Экономия"] {
            assert!(prompt[example..answer].contains(label), "{label}");
        }
    }
}
