//! Create `images` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Images::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Images::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Images::FileId).string_len(256).not_null())
                    .col(ColumnDef::new(Images::ThumbFileId).string_len(256))
                    .col(
                        ColumnDef::new(Images::ShortCode)
                            .string_len(16)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Images::Tags).string_len(512).not_null())
                    .col(ColumnDef::new(Images::Filename).string_len(256).not_null())
                    .col(ColumnDef::new(Images::Size).big_integer().not_null())
                    .col(ColumnDef::new(Images::Folder).string_len(512).not_null())
                    .col(
                        ColumnDef::new(Images::ContentType)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Images::Digest).string_len(32))
                    .col(ColumnDef::new(Images::ExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Images::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: folder (for listing folder contents and prefix scans)
        manager
            .create_index(
                Index::create()
                    .name("idx_images_folder")
                    .table(Images::Table)
                    .col(Images::Folder)
                    .to_owned(),
            )
            .await?;

        // Index: digest (for duplicate grouping)
        manager
            .create_index(
                Index::create()
                    .name("idx_images_digest")
                    .table(Images::Table)
                    .col(Images::Digest)
                    .to_owned(),
            )
            .await?;

        // Index: created_at (for pagination)
        manager
            .create_index(
                Index::create()
                    .name("idx_images_created_at")
                    .table(Images::Table)
                    .col(Images::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Images::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Images {
    Table,
    Id,
    FileId,
    ThumbFileId,
    ShortCode,
    Tags,
    Filename,
    Size,
    Folder,
    ContentType,
    Digest,
    ExpiresAt,
    CreatedAt,
}
