use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct AuthResponse {
    pub token: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct FindResponse {
    pub slots: Option<Vec<Slot>>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Slot {
    pub config: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DetailsResponse {
    pub book_token: Option<BookTokenField>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BookTokenField {
    pub value: Option<String>,
}
