use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("tasks"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("name")).string().not_null())
                    .col(ColumnDef::new(Alias::new("description")).text().null())
                    .col(
                        ColumnDef::new(Alias::new("status"))
                            .string_len(32)
                            .not_null()
                            .default("created"),
                    )
                    .col(
                        ColumnDef::new(Alias::new("workspace_id"))
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("current_image")).string().null())
                    .col(
                        ColumnDef::new(Alias::new("current_policy_id"))
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("llm_model"))
                            .string()
                            .not_null()
                            .default("gemma3:4b"),
                    )
                    .col(
                        ColumnDef::new(Alias::new("workflow_id"))
                            .string()
                            .null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Alias::new("workflow_run_id")).string().null())
                    .col(ColumnDef::new(Alias::new("created_by")).string().null())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("updated_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("started_at"))
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("completed_at"))
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("policies"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("task_id"))
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("version")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("tools_allowed")).json().null())
                    .col(ColumnDef::new(Alias::new("network_rules")).json().null())
                    .col(ColumnDef::new(Alias::new("filesystem_rules")).json().null())
                    .col(ColumnDef::new(Alias::new("database_rules")).json().null())
                    .col(ColumnDef::new(Alias::new("resource_limits")).json().null())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("created_by")).string().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_policies_task_id")
                            .from(Alias::new("policies"), Alias::new("task_id"))
                            .to(Alias::new("tasks"), Alias::new("id")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_policies_task_version")
                    .table(Alias::new("policies"))
                    .col(Alias::new("task_id"))
                    .col(Alias::new("version"))
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("capability_requests"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("task_id"))
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("capability_type"))
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("resource_name"))
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("justification")).text().not_null())
                    .col(ColumnDef::new(Alias::new("details")).json().null())
                    .col(
                        ColumnDef::new(Alias::new("status"))
                            .string_len(32)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Alias::new("decision_notes")).text().null())
                    .col(
                        ColumnDef::new(Alias::new("alternative_suggestion"))
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(Alias::new("reviewed_by")).string().null())
                    .col(
                        ColumnDef::new(Alias::new("reviewed_at"))
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("requested_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_capability_requests_task_id")
                            .from(Alias::new("capability_requests"), Alias::new("task_id"))
                            .to(Alias::new("tasks"), Alias::new("id")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("task_outputs"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("task_id"))
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("iteration")).integer().not_null())
                    .col(
                        ColumnDef::new(Alias::new("completed"))
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Alias::new("capability_requested"))
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Alias::new("agent_logs")).text().null())
                    .col(ColumnDef::new(Alias::new("output")).json().null())
                    .col(ColumnDef::new(Alias::new("error")).text().null())
                    .col(
                        ColumnDef::new(Alias::new("llm_response_preview"))
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(Alias::new("model_used")).string().null())
                    .col(ColumnDef::new(Alias::new("image_used")).string().null())
                    .col(ColumnDef::new(Alias::new("duration_ms")).big_integer().null())
                    .col(ColumnDef::new(Alias::new("deliverables")).json().null())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_outputs_task_id")
                            .from(Alias::new("task_outputs"), Alias::new("task_id"))
                            .to(Alias::new("tasks"), Alias::new("id")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_task_outputs_task_iteration")
                    .table(Alias::new("task_outputs"))
                    .col(Alias::new("task_id"))
                    .col(Alias::new("iteration"))
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("task_messages"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("task_id"))
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("role"))
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("content")).text().not_null())
                    .col(ColumnDef::new(Alias::new("metadata")).json().null())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_messages_task_id")
                            .from(Alias::new("task_messages"), Alias::new("task_id"))
                            .to(Alias::new("tasks"), Alias::new("id")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("deployments"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("name")).string().not_null())
                    .col(
                        ColumnDef::new(Alias::new("task_id"))
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("image_tag")).string().null())
                    .col(ColumnDef::new(Alias::new("entrypoint")).string().null())
                    .col(ColumnDef::new(Alias::new("port")).integer().null())
                    .col(
                        ColumnDef::new(Alias::new("status"))
                            .string_len(32)
                            .not_null()
                            .default("pending_approval"),
                    )
                    .col(ColumnDef::new(Alias::new("container_id")).string().null())
                    .col(ColumnDef::new(Alias::new("host_port")).integer().null())
                    .col(ColumnDef::new(Alias::new("url")).string().null())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("approved_at"))
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("built_at"))
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("started_at"))
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("stopped_at"))
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Alias::new("error")).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deployments_task_id")
                            .from(Alias::new("deployments"), Alias::new("task_id"))
                            .to(Alias::new("tasks"), Alias::new("id")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("llm_provider_config"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("key"))
                            .string_len(128)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("value"))
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Alias::new("updated_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("llm_provider_config")).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Alias::new("deployments")).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Alias::new("task_messages")).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Alias::new("task_outputs")).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Alias::new("capability_requests")).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Alias::new("policies")).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Alias::new("tasks")).to_owned())
            .await?;
        Ok(())
    }
}
