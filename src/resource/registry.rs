//! The resource catalog: every CRUD resource of the reference directory as a
//! descriptor. Field lists, defaults, delete modes, and per-resource status
//! codes mirror the deployed API's behavior.

use super::descriptor::{
    DeleteMode, FieldSpec, IncludeDirection, IncludeSpec, KeyKind, KeyPart, KeySpec,
    NotFoundStatus, ResourceDescriptor, UsageBump,
};
use axum::http::StatusCode;
use serde_json::{json, Value};
use std::collections::HashMap;

fn text(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        required: false,
        default: None,
        pg_type: "text",
    }
}

fn required_text(name: &'static str) -> FieldSpec {
    FieldSpec {
        required: true,
        ..text(name)
    }
}

fn text_default(name: &'static str, value: &str) -> FieldSpec {
    FieldSpec {
        default: Some(Value::String(value.to_string())),
        ..text(name)
    }
}

fn bigint(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        required: false,
        default: None,
        pg_type: "bigint",
    }
}

fn required_bigint(name: &'static str) -> FieldSpec {
    FieldSpec {
        required: true,
        ..bigint(name)
    }
}

fn boolean_default(name: &'static str, value: bool) -> FieldSpec {
    FieldSpec {
        name,
        required: false,
        default: Some(Value::Bool(value)),
        pg_type: "boolean",
    }
}

fn integer_default(name: &'static str, value: i64) -> FieldSpec {
    FieldSpec {
        name,
        required: false,
        default: Some(json!(value)),
        pg_type: "integer",
    }
}

fn integer(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        required: false,
        default: None,
        pg_type: "integer",
    }
}

fn double(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        required: false,
        default: None,
        pg_type: "double precision",
    }
}

fn timestamp(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        required: false,
        default: None,
        pg_type: "timestamptz",
    }
}

/// Simple resource baseline: bigint `id` key, soft delete, reads filtered,
/// not-found answered as 404, create answered as 200.
fn resource(
    path_segment: &'static str,
    display_name: &'static str,
    table: &'static str,
    fields: Vec<FieldSpec>,
) -> ResourceDescriptor {
    ResourceDescriptor {
        path_segment,
        display_name,
        table,
        key: KeySpec::Single {
            column: "id",
            kind: KeyKind::BigInt,
        },
        delete: DeleteMode::Soft,
        delete_extra_sets: Vec::new(),
        filter_deleted_reads: true,
        not_found: NotFoundStatus::NotFound,
        not_found_message: None,
        created_status: StatusCode::OK,
        create_bump: None,
        fields,
        list_default_filters: Vec::new(),
        includes: Vec::new(),
    }
}

fn hard(mut d: ResourceDescriptor) -> ResourceDescriptor {
    d.delete = DeleteMode::Hard;
    d.filter_deleted_reads = false;
    d
}

/// Join-table baseline: compound key, soft delete, unfiltered reads (the
/// deployed handlers never filtered join reads), not-found answered as 404.
/// address-user alone answered 400 and overrides this.
fn join(
    path_segment: &'static str,
    display_name: &'static str,
    table: &'static str,
    first: (&'static str, &'static str),
    second: (&'static str, &'static str),
    fields: Vec<FieldSpec>,
) -> ResourceDescriptor {
    ResourceDescriptor {
        path_segment,
        display_name,
        table,
        key: KeySpec::Compound {
            first: KeyPart {
                column: first.0,
                display: first.1,
            },
            second: KeyPart {
                column: second.0,
                display: second.1,
            },
        },
        delete: DeleteMode::Soft,
        delete_extra_sets: Vec::new(),
        filter_deleted_reads: false,
        not_found: NotFoundStatus::NotFound,
        not_found_message: None,
        created_status: StatusCode::OK,
        create_bump: None,
        fields,
        list_default_filters: Vec::new(),
        includes: Vec::new(),
    }
}

pub struct ResourceRegistry {
    resources: Vec<ResourceDescriptor>,
    by_path: HashMap<&'static str, usize>,
}

impl ResourceRegistry {
    /// The full catalog served by the API.
    pub fn standard() -> Self {
        let mut resources = Vec::new();

        let mut users = resource(
            "users",
            "User",
            "users",
            vec![
                required_text("name"),
                text("middle_name"),
                text("last_name"),
                text("avatar"),
                required_text("role"),
                required_text("email"),
                required_text("password"),
                text("remember_token"),
                timestamp("email_verified_at"),
                boolean_default("is_active", true),
                boolean_default("is_accepted", true),
                integer_default("max_tokens", 20),
                integer_default("used_tokens", 0),
                text("status"),
                text_default("invite_token", "default-invite-token"),
            ],
        );
        users.not_found = NotFoundStatus::BadRequest;
        users.delete_extra_sets = vec![("is_active", Value::Bool(false))];
        users.list_default_filters = vec![("is_active", Value::Bool(true))];
        resources.push(users);

        let mut reset_tokens = resource(
            "password-reset-tokens",
            "Token",
            "password_reset_tokens",
            vec![required_text("email"), required_text("token")],
        );
        reset_tokens.key = KeySpec::Single {
            column: "email",
            kind: KeyKind::Text,
        };
        reset_tokens.not_found = NotFoundStatus::BadRequest;
        resources.push(reset_tokens);

        let mut articles = hard(resource(
            "articles",
            "Article",
            "articles",
            vec![
                required_text("title"),
                text("description"),
                text("url"),
                boolean_default("is_active", true),
            ],
        ));
        articles.not_found = NotFoundStatus::BadRequest;
        resources.push(articles);

        let mut addresses = resource(
            "addresses",
            "Address",
            "addresses",
            vec![
                required_bigint("city_id"),
                bigint("address_type_id"),
                text("nb_civic"),
                text("nb_room"),
                text("nb_office"),
                text("name"),
                text("street"),
                text("zip"),
                text("complement"),
                text("description"),
                double("lat"),
                double("long"),
            ],
        );
        addresses.not_found = NotFoundStatus::BadRequest;
        resources.push(addresses);

        let mut address_types = resource(
            "address-types",
            "Address type",
            "address_types",
            vec![required_text("name"), text("description")],
        );
        address_types.not_found = NotFoundStatus::BadRequest;
        resources.push(address_types);

        resources.push(resource(
            "countries",
            "Country",
            "countries",
            vec![
                required_text("name"),
                text("geocode"),
                double("lat"),
                double("long"),
            ],
        ));

        resources.push(resource(
            "provinces",
            "Province",
            "provinces",
            vec![
                required_bigint("country_id"),
                required_text("name"),
                text("uf"),
                text("geocode"),
                double("lat"),
                double("long"),
            ],
        ));

        let mut cities = resource(
            "cities",
            "City",
            "cities",
            vec![
                required_bigint("province_id"),
                required_text("name"),
                text("geocode"),
                double("lat"),
                double("long"),
            ],
        );
        cities.includes = vec![IncludeSpec {
            name: "provinces",
            direction: IncludeDirection::ToOne,
            related_table: "provinces",
            our_key: "province_id",
            their_key: "id",
        }];
        resources.push(cities);

        for (path, display, table) in [
            ("phones", "Phone", "phones"),
            ("cell-phones", "Cell phone", "cell_phones"),
            ("faxes", "Fax", "faxes"),
        ] {
            resources.push(resource(
                path,
                display,
                table,
                vec![
                    required_bigint("address_id"),
                    required_text("number"),
                    text("note"),
                ],
            ));
        }

        resources.push(resource(
            "languages",
            "Language",
            "languages",
            vec![
                bigint("country_id"),
                text("family"),
                required_text("iso_name"),
                text("native_name"),
                text("tag"),
                text("note"),
            ],
        ));

        resources.push(resource(
            "user-types",
            "User type",
            "user_types",
            vec![bigint("language_id"), required_text("type"), text("note")],
        ));

        resources.push(resource(
            "user-groups",
            "User group",
            "user_groups",
            vec![bigint("language_id"), required_text("group"), text("note")],
        ));

        resources.push(hard(resource(
            "professionals",
            "Professional",
            "professionals",
            vec![
                bigint("user_id"),
                required_text("name"),
                text("last_name"),
                text("sex"),
                text("image_path"),
                text("url"),
            ],
        )));

        resources.push(resource(
            "tokens",
            "Token",
            "tokens",
            vec![
                bigint("father_user_id"),
                bigint("son_user_id"),
                bigint("reference_id"),
                required_text("token"),
            ],
        ));

        resources.push(hard(resource(
            "references",
            "Reference",
            "references",
            vec![
                required_text("token"),
                text("father_message"),
                boolean_default("is_used", false),
            ],
        )));

        resources.push(hard(resource(
            "videos",
            "Video",
            "videos",
            vec![required_text("path"), boolean_default("is_active", true)],
        )));

        for (path, display, table) in [("images", "Image", "images"), ("audios", "Audio", "audios")]
        {
            resources.push(hard(resource(
                path,
                display,
                table,
                vec![
                    required_text("path"),
                    text("caption"),
                    boolean_default("is_active", true),
                ],
            )));
        }

        resources.push(hard(resource(
            "specialties",
            "Specialty",
            "specialties",
            vec![required_bigint("profession_id"), required_text("name")],
        )));

        resources.push(hard(resource(
            "professions",
            "Profession",
            "professions",
            vec![required_text("name")],
        )));

        let mut topics = hard(resource(
            "topics",
            "Topic",
            "topics",
            vec![required_text("name"), text("description")],
        ));
        topics.created_status = StatusCode::CREATED;
        topics.includes = vec![IncludeSpec {
            name: "questions",
            direction: IncludeDirection::ToMany,
            related_table: "questions",
            our_key: "id",
            their_key: "topic_id",
        }];
        resources.push(topics);

        let mut quizzes = hard(resource(
            "quizzes",
            "Quiz",
            "quizzes",
            vec![
                bigint("topic_id"),
                bigint("user_id"),
                required_text("title"),
                text("description"),
            ],
        ));
        quizzes.created_status = StatusCode::CREATED;
        quizzes.includes = vec![IncludeSpec {
            name: "user_responses",
            direction: IncludeDirection::ToMany,
            related_table: "user_responses",
            our_key: "id",
            their_key: "quiz_id",
        }];
        resources.push(quizzes);

        let mut user_responses = hard(resource(
            "user-responses",
            "User response",
            "user_responses",
            vec![
                bigint("user_id"),
                bigint("quiz_id"),
                required_bigint("question_id"),
                bigint("selected_option_id"),
                integer("time_taken"),
                text("feedback"),
            ],
        ));
        user_responses.created_status = StatusCode::CREATED;
        user_responses.create_bump = Some(UsageBump {
            body_field: "selected_option_id",
            table: "question_options",
            column: "usage_count",
        });
        resources.push(user_responses);

        let mut address_user = join(
            "address-user",
            "Address-User relationship",
            "address_user",
            ("user_id", "User ID"),
            ("address_id", "Address ID"),
            Vec::new(),
        );
        address_user.not_found = NotFoundStatus::BadRequest;
        resources.push(address_user);

        resources.push(join(
            "country-user",
            "Country-user relationship",
            "country_user",
            ("user_id", "User ID"),
            ("country_id", "Country ID"),
            Vec::new(),
        ));

        resources.push(join(
            "language-user",
            "Language-user relationship",
            "language_user",
            ("user_id", "User ID"),
            ("language_id", "Language ID"),
            Vec::new(),
        ));

        resources.push(join(
            "user-group-user",
            "User-group relationship",
            "user_group_user",
            ("user_id", "User ID"),
            ("user_group_id", "Group ID"),
            Vec::new(),
        ));

        resources.push(join(
            "user-type-user",
            "User-type relationship",
            "user_type_user",
            ("user_id", "User ID"),
            ("user_type_id", "User Type ID"),
            Vec::new(),
        ));

        for (path, display, table, first) in [
            (
                "article-audio",
                "Article-Audio relationship",
                "article_audio",
                ("audio_id", "Audio ID"),
            ),
            (
                "article-video",
                "Video-article relationship",
                "article_video",
                ("video_id", "Video ID"),
            ),
            (
                "article-image",
                "Article image relationship",
                "article_image",
                ("image_id", "Image ID"),
            ),
        ] {
            let mut d = join(
                path,
                display,
                table,
                first,
                ("article_id", "Article ID"),
                Vec::new(),
            );
            d.delete = DeleteMode::Hard;
            resources.push(d);
        }

        let mut article_professional = join(
            "article-professional",
            "Record",
            "article_professional",
            ("professional_id", "Professional ID"),
            ("article_id", "Article ID"),
            Vec::new(),
        );
        article_professional.delete = DeleteMode::Hard;
        article_professional.not_found_message = Some("Record not found.");
        resources.push(article_professional);

        let mut prof_specialty = join(
            "professional-specialty",
            "Professional-Specialty relationship",
            "professional_specialty",
            ("professional_id", "Professional ID"),
            ("specialty_id", "Specialty ID"),
            vec![
                text("permission_identifier"),
                timestamp("start"),
                timestamp("end"),
            ],
        );
        prof_specialty.delete = DeleteMode::Hard;
        resources.push(prof_specialty);

        let mut prof_province = join(
            "professional-province",
            "ProfessionalProvince",
            "professional_province",
            ("professional_id", "Professional ID"),
            ("province_id", "Province ID"),
            vec![
                text("permission_identifier"),
                boolean_default("is_active", true),
                timestamp("start"),
            ],
        );
        prof_province.delete = DeleteMode::Hard;
        resources.push(prof_province);

        let by_path = resources
            .iter()
            .enumerate()
            .map(|(i, d)| (d.path_segment, i))
            .collect();
        ResourceRegistry { resources, by_path }
    }

    pub fn get(&self, path_segment: &str) -> Option<&ResourceDescriptor> {
        self.by_path
            .get(path_segment)
            .map(|&i| &self.resources[i])
    }

    pub fn all(&self) -> &[ResourceDescriptor] {
        &self.resources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_segments_are_disjoint() {
        let registry = ResourceRegistry::standard();
        assert_eq!(registry.all().len(), registry.by_path.len());
    }

    #[test]
    fn users_defaults_match_contract() {
        let registry = ResourceRegistry::standard();
        let users = registry.get("users").unwrap();
        assert_eq!(
            users.field("is_active").unwrap().default,
            Some(Value::Bool(true))
        );
        assert_eq!(users.field("max_tokens").unwrap().default, Some(json!(20)));
        assert_eq!(users.field("used_tokens").unwrap().default, Some(json!(0)));
        assert_eq!(
            users.field("invite_token").unwrap().default,
            Some(json!("default-invite-token"))
        );
        assert!(users.field("email").unwrap().required);
        assert_eq!(users.not_found, NotFoundStatus::BadRequest);
        assert_eq!(users.delete, DeleteMode::Soft);
        assert_eq!(
            users.delete_extra_sets,
            vec![("is_active", Value::Bool(false))]
        );
    }

    #[test]
    fn cities_answer_404_and_soft_delete() {
        let registry = ResourceRegistry::standard();
        let cities = registry.get("cities").unwrap();
        assert_eq!(cities.not_found, NotFoundStatus::NotFound);
        assert_eq!(cities.delete, DeleteMode::Soft);
        assert!(cities.filter_deleted_reads);
    }

    #[test]
    fn professionals_and_topics_hard_delete() {
        let registry = ResourceRegistry::standard();
        assert_eq!(
            registry.get("professionals").unwrap().delete,
            DeleteMode::Hard
        );
        assert_eq!(registry.get("topics").unwrap().delete, DeleteMode::Hard);
        assert_eq!(
            registry.get("topics").unwrap().created_status,
            StatusCode::CREATED
        );
    }

    #[test]
    fn not_found_statuses_match_the_deployed_handlers() {
        let registry = ResourceRegistry::standard();
        let answers_400 = [
            "users",
            "articles",
            "addresses",
            "address-types",
            "password-reset-tokens",
            "address-user",
        ];
        for path in answers_400 {
            assert_eq!(
                registry.get(path).unwrap().not_found,
                NotFoundStatus::BadRequest,
                "{} answered 400",
                path
            );
        }
        let answers_404 = [
            "cities",
            "tokens",
            "country-user",
            "language-user",
            "user-group-user",
            "user-type-user",
            "article-audio",
            "article-video",
            "article-image",
            "article-professional",
            "professional-specialty",
            "professional-province",
        ];
        for path in answers_404 {
            assert_eq!(
                registry.get(path).unwrap().not_found,
                NotFoundStatus::NotFound,
                "{} answered 404",
                path
            );
        }
    }

    #[test]
    fn not_found_messages_match_the_deployed_handlers() {
        let registry = ResourceRegistry::standard();
        let expected = [
            ("password-reset-tokens", "Token not found"),
            ("country-user", "Country-user relationship not found"),
            ("language-user", "Language-user relationship not found"),
            ("user-group-user", "User-group relationship not found"),
            ("user-type-user", "User-type relationship not found"),
            ("article-video", "Video-article relationship not found"),
            ("article-image", "Article image relationship not found"),
            ("article-professional", "Record not found."),
            ("professional-province", "ProfessionalProvince not found"),
        ];
        for (path, message) in expected {
            assert_eq!(
                registry.get(path).unwrap().not_found_error().message(),
                message,
                "{}",
                path
            );
        }
    }

    #[test]
    fn user_responses_carry_the_option_usage_bump() {
        let registry = ResourceRegistry::standard();
        let bump = registry
            .get("user-responses")
            .unwrap()
            .create_bump
            .as_ref()
            .unwrap();
        assert_eq!(bump.body_field, "selected_option_id");
        assert_eq!(bump.table, "question_options");
        assert_eq!(bump.column, "usage_count");
    }

    #[test]
    fn join_tables_use_compound_keys() {
        let registry = ResourceRegistry::standard();
        let au = registry.get("address-user").unwrap();
        assert!(au.key.is_compound());
        assert_eq!(au.key.columns(), vec!["user_id", "address_id"]);
        assert_eq!(au.not_found, NotFoundStatus::BadRequest);
    }

    #[test]
    fn password_reset_tokens_use_text_key() {
        let registry = ResourceRegistry::standard();
        let prt = registry.get("password-reset-tokens").unwrap();
        match &prt.key {
            KeySpec::Single { column, kind } => {
                assert_eq!(*column, "email");
                assert_eq!(*kind, KeyKind::Text);
            }
            _ => panic!("expected single key"),
        }
    }
}
