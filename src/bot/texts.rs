//! User-facing reply texts.

pub const WELCOME: &str = "👋 Привет! Я генератор AI-first бизнес идей.\n\n\
🚀 Я предлагаю идеи, где искусственный интеллект - это ЯДРО продукта,\n\
а не просто вспомогательный инструмент.\n\n\
💡 Все идеи для небольших команд (2-5 человек) и невозможны без AI/ML.";

pub const UNKNOWN_COMMAND: &str = "❓ Команда не распознана.\n\nИспользуйте /help чтобы увидеть список доступных команд.";

pub const RATE_LIMITED: &str = "⏱️ Слишком много запросов. Пожалуйста, подождите минуту и попробуйте снова.";

pub const GENERIC_ERROR: &str = "😕 Произошла ошибка. Пожалуйста, попробуйте позже.";

pub const AI_FOOTER: &str = "🤖 Сгенерировано AI";

pub const VOICE_UNAVAILABLE: &str = "❌ Голосовые сообщения недоступны: не настроены API ключи.\n\n\
Для работы с голосовыми сообщениями требуются:\n\
• YANDEX_API_KEY\n\
• YANDEX_FOLDER_ID\n\
• ключ AI-провайдера (VOICE_PROVIDER)\n\n\
Текущие команды работают: /idea, /help";

pub const VOICE_TOO_LONG: &str = "⏱ Голосовое сообщение слишком длинное.\n\n\
Пожалуйста, отправьте сообщение не длиннее 30 секунд.";

pub const VOICE_DOWNLOAD_FAILED: &str = "❌ Не удалось загрузить голосовое сообщение.\n\nПопробуйте отправить его еще раз.";

pub const VOICE_TRANSCRIPTION_FAILED: &str = "❌ Не удалось распознать речь.\n\n\
Возможные причины:\n\
• Плохое качество звука\n\
• Слишком тихая запись\n\
• Проблемы с Yandex SpeechKit API\n\n\
Попробуйте записать сообщение еще раз.";

pub const VOICE_GENERIC_FAILURE: &str = "❌ Произошла ошибка при обработке голосового сообщения.\n\n\
Попробуйте еще раз или используйте текстовые команды.";

pub const CONTACT_UNAVAILABLE: &str = "💼 К сожалению, функция сбора заявок временно недоступна.\n\n\
Вы можете связаться с нами напрямую или попробовать позже.";

pub const CONTACT_ASK_NAME: &str = "📝 Давайте оставим заявку на консультацию!\n\nКак вас зовут?";

pub const CONTACT_ASK_EMAIL: &str = "Отлично! Последний шаг - укажите email (или напишите 'пропустить'):";

pub const CONTACT_BAD_EMAIL: &str = "Похоже, это не email. Укажите адрес вида name@example.com (или напишите 'пропустить'):";

pub const CONTACT_EMPTY_NAME: &str = "Имя не может быть пустым. Как вас зовут?";

pub const CONTACT_DONE: &str = "✅ Спасибо! Ваша заявка принята.\n\n\
Мы свяжемся с вами в ближайшее время!\n\n\
💡 А пока можете попробовать /idea для новых AI-бизнес идей.";

pub const CONTACT_CRM_FAILED: &str = "💼 Не удалось создать заявку в CRM. Пожалуйста, свяжитесь с нами напрямую.";

/// Word that skips an optional contact field.
pub const SKIP_WORD: &str = "пропустить";

pub fn contact_ask_phone(name: &str) -> String {
    format!("Приятно познакомиться, {name}!\n\nТеперь укажите ваш телефон (или напишите 'пропустить'):")
}

pub fn help(topics: &[&str]) -> String {
    format!(
        "📖 Доступные команды:\n\n\
/start - Начать работу с ботом\n\
/idea - Получить случайную AI-first бизнес идею\n\
/idea <область> - Получить идею в конкретной области\n\
/contact - Оставить заявку на консультацию\n\
/help - Показать эту справку\n\n\
🎤 Голосовое сообщение, начинающееся с «Придумай идею…», тоже работает.\n\n\
💡 Области для генерации идей:\n{}\n\n\
🎯 Все идеи про бизнес, где AI - это КЛЮЧЕВОЙ ЭЛЕМЕНТ,\n\
без которого продукт не может существовать.\n\
Подходят для команд 2-5 человек.",
        topics.join(", ")
    )
}

pub fn start(topics: &[&str]) -> String {
    let list: Vec<String> = topics.iter().map(|t| format!("• /idea {t}")).collect();
    format!(
        "{WELCOME}\n\n\
Используйте /idea для случайной идеи или /idea <область> для специфичной:\n\n\
📋 Доступные области:\n{}\n\n\
💼 Или /contact чтобы оставить заявку на консультацию.",
        list.join("\n")
    )
}
