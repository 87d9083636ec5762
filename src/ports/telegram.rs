pub trait TelegramSender: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type Fut<'a>: Future<Output = Result<(), Self::Error>> + Send + 'a
    where
        Self: 'a;

    fn send_message<'a>(&'a self, chat_id: i64, text: &'a str) -> Self::Fut<'a>;
}
