//! Canned AI-first business ideas used when remote generation is unavailable.

use rand::seq::IndexedRandom;

/// Topic keys accepted by `/idea <topic>`, in display order.
pub const TOPICS: [&str; 6] = ["sales", "marketing", "hr", "product", "support", "finance"];

const SALES: &[&str] = &[
    "🎯 AI-скоринг входящих лидов для B2B: модель на истории сделок из CRM ранжирует заявки по вероятности оплаты, менеджеры звонят сначала горячим. Подписка 15к₽/мес.",
    "📞 Голосовой AI-ассистент, который прослушивает звонки отдела продаж, находит упущенные возражения и пишет персональные рекомендации каждому менеджеру.",
    "✉️ Генератор персональных холодных писем: LLM изучает сайт и вакансии компании-клиента и пишет письмо под её текущие боли. Оплата за отправленное письмо.",
];

const MARKETING: &[&str] = &[
    "📸 AI-студия карточек для маркетплейсов: по фото товара генерирует инфографику, описание и SEO-заголовки для Wildberries и Ozon за минуту.",
    "📊 Предсказание выгорания рекламных креативов: модель по метрикам первых часов показа говорит, какие объявления остановить, а какие масштабировать.",
    "🎬 Сервис, который превращает длинный вебинар в 20 коротких роликов с субтитрами и хуками для соцсетей с помощью распознавания речи и LLM.",
];

const HR: &[&str] = &[
    "🧑‍💼 AI-рекрутер первого контакта: проводит голосовое интервью с кандидатом на массовую вакансию, оценивает ответы и передаёт HR только подходящих.",
    "📄 Парсер резюме с семантическим поиском: LLM сопоставляет опыт кандидата с задачами вакансии, а не с ключевыми словами. Тариф за закрытую вакансию.",
    "🔮 Модель прогноза увольнений по активности в рабочих чатах и трекерах, которая заранее подсказывает руководителю, с кем поговорить.",
];

const PRODUCT: &[&str] = &[
    "🗂 AI-аналитик отзывов: собирает отзывы из магазинов приложений и поддержки, кластеризует боли пользователей и формирует бэклог для продакта.",
    "🧪 Генератор гипотез для A/B тестов: модель изучает воронку продукта и предлагает эксперименты с оценкой ожидаемого эффекта.",
    "🖼 Сервис, который по текстовому описанию фичи генерирует кликабельный прототип интерфейса для проверки на пользователях за день.",
];

const SUPPORT: &[&str] = &[
    "💬 AI-оператор первой линии, обученный на базе знаний компании: закрывает 70% типовых обращений в Telegram и передаёт человеку только сложные.",
    "😡 Детектор эскалаций: модель по тону переписки находит клиентов на грани ухода и поднимает их в очереди поддержки.",
    "📚 Автоматическое пополнение базы знаний: LLM превращает решённые тикеты в статьи FAQ и находит устаревшие ответы.",
];

const FINANCE: &[&str] = &[
    "🧾 Распознавание первичных документов для малого бизнеса: фото чека или накладной превращается в проводку в 1С без ручного ввода.",
    "📉 AI-прогноз кассовых разрывов по банковской выписке и счетам: за две недели предупреждает владельца о нехватке денег.",
    "🕵️ Поиск аномалий в расходах компании: модель находит дубли счетов, завышенные закупки и подозрительных контрагентов.",
];

const GENERAL: &[&str] = &[
    "🚀 AI-юрист для самозанятых: проверяет договоры, находит рискованные пункты и предлагает правки простым языком. 990₽ за договор.",
    "🍳 AI-шеф для кафе: по продажам и остаткам формирует меню и список закупок на неделю, снижая списания продуктов.",
    "🏗 Компьютерное зрение для стройки: камера фиксирует прогресс работ и нарушения техники безопасности, отчёт прорабу каждый вечер.",
    "🎓 AI-репетитор по ЕГЭ, который строит персональный план подготовки по ошибкам ученика и объясняет задачи голосом.",
    "🚚 Оптимизатор маршрутов для небольших служб доставки: модель учитывает пробки, окна доставки и загрузку курьеров.",
];

/// Candidate set for a topic, matched case-insensitively.
fn candidates(topic: &str) -> Option<&'static [&'static str]> {
    match topic.trim().to_lowercase().as_str() {
        "sales" => Some(SALES),
        "marketing" => Some(MARKETING),
        "hr" => Some(HR),
        "product" => Some(PRODUCT),
        "support" => Some(SUPPORT),
        "finance" => Some(FINANCE),
        _ => None,
    }
}

/// Whether `topic` is one of [`TOPICS`].
pub fn is_known_topic(topic: &str) -> bool {
    candidates(topic).is_some()
}

/// Pick a random idea for `topic`, or from the general pool when the topic is
/// absent or unknown.
pub fn pick(topic: Option<&str>) -> &'static str {
    let pool = topic.and_then(candidates).unwrap_or(GENERAL);
    pool.choose(&mut rand::rng()).copied().unwrap_or(GENERAL[0])
}
