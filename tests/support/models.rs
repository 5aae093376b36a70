//! Model fixtures shared by the integration tests.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use datamapper::{
    impl_model, Datastore, FieldDefinition, FieldType, Model, ModelDefinition, SchemaDefinition,
    Value,
};

pub struct User {
    model: Model,
}

impl User {
    fn definition() -> SchemaDefinition {
        SchemaDefinition::new()
            .meta("version", 1)
            .field(
                "name",
                FieldDefinition::new(FieldType::String).default_value("anon"),
            )
            .field("age", FieldDefinition::new(FieldType::Number))
            .field("joined", FieldDefinition::new(FieldType::Date))
            .field("avatar", FieldDefinition::new(FieldType::Bytes))
            .field("settings", FieldDefinition::new(FieldType::Mixed))
            .field(
                "tags",
                FieldDefinition::new(FieldType::array_of(FieldType::String)),
            )
            .field("profile", FieldDefinition::new(FieldType::model_ref::<Profile>()))
            .field("team", FieldDefinition::new(FieldType::model_ref::<Team>()))
            .field(
                "posts",
                FieldDefinition::new(FieldType::array_of(FieldType::model_ref::<Post>())),
            )
    }

    pub fn name(&self) -> Option<&str> {
        self.model.get("name").and_then(Value::as_str)
    }

    pub fn set_name(&mut self, name: &str) {
        self.model.set("name", name).unwrap();
    }

    pub fn age(&self) -> Option<i64> {
        self.model.get("age").and_then(Value::as_i64)
    }

    pub fn joined(&self) -> Option<&DateTime<Utc>> {
        self.model.get("joined").and_then(Value::as_date)
    }

    pub fn profile(&self) -> Option<&Model> {
        self.model.get("profile").and_then(Value::as_model)
    }

    pub fn set_profile(&mut self, profile: Profile) {
        self.model.set("profile", profile.into_model()).unwrap();
    }

    pub fn team(&self) -> Option<&Model> {
        self.model.get("team").and_then(Value::as_model)
    }

    pub fn set_team(&mut self, team: Team) {
        self.model.set("team", team.into_model()).unwrap();
    }
}

impl_model!(User, model, "User", definition);

pub struct Profile {
    model: Model,
}

impl Profile {
    fn definition() -> SchemaDefinition {
        SchemaDefinition::new().field("bio", FieldDefinition::new(FieldType::String))
    }

    pub fn bio(&self) -> Option<&str> {
        self.model.get("bio").and_then(Value::as_str)
    }
}

impl_model!(Profile, model, "Profile", definition);

pub struct Team {
    model: Model,
}

impl Team {
    fn definition() -> SchemaDefinition {
        SchemaDefinition::new().field("title", FieldDefinition::new(FieldType::String))
    }
}

impl_model!(Team, model, "Team", definition);

pub struct Post {
    model: Model,
}

impl Post {
    fn definition() -> SchemaDefinition {
        SchemaDefinition::new()
            .field("title", FieldDefinition::new(FieldType::String).required())
    }
}

impl_model!(Post, model, "Post", definition);

/// Model whose class-level repository is set once per test binary.
pub struct Tag {
    model: Model,
}

impl Tag {
    fn definition() -> SchemaDefinition {
        SchemaDefinition::new().field("label", FieldDefinition::new(FieldType::String))
    }

    pub fn repository() -> &'static OnceLock<Datastore> {
        static REPOSITORY: OnceLock<Datastore> = OnceLock::new();
        &REPOSITORY
    }
}

impl ModelDefinition for Tag {
    const NAME: &'static str = "Tag";

    fn define() -> SchemaDefinition {
        Self::definition()
    }

    fn from_model(model: Model) -> Self {
        Tag { model }
    }

    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    fn into_model(self) -> Model {
        self.model
    }

    fn default_repository() -> Option<Datastore> {
        Self::repository().get().cloned()
    }
}
