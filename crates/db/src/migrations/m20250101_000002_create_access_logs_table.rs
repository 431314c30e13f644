//! Create `access_logs` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AccessLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AccessLogs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AccessLogs::Kind).string_len(16).not_null())
                    .col(
                        ColumnDef::new(AccessLogs::FileId)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AccessLogs::Ip).string_len(64))
                    .col(
                        ColumnDef::new(AccessLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: file_id (for per-image view counts)
        manager
            .create_index(
                Index::create()
                    .name("idx_access_logs_file_id")
                    .table(AccessLogs::Table)
                    .col(AccessLogs::FileId)
                    .to_owned(),
            )
            .await?;

        // Index: created_at (for pagination)
        manager
            .create_index(
                Index::create()
                    .name("idx_access_logs_created_at")
                    .table(AccessLogs::Table)
                    .col(AccessLogs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AccessLogs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AccessLogs {
    Table,
    Id,
    Kind,
    FileId,
    Ip,
    CreatedAt,
}
