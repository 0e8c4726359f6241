//! Highlander database releases, oldest first.
//!
//! New releases are appended at the end of [`all`]; existing entries are
//! never edited once shipped, since databases in the field already carry
//! their effects.

use anyhow::Result;

use super::VersionStep;
use super::annotation_split::AnnotationSplit;
use super::backfills::{LevenshteinFunction, NormalSampleBackfill, OutsourcingBackfill};
use crate::version::Version;

pub fn all() -> Result<Vec<VersionStep>> {
    Ok(vec![
        v1_9()?,
        v1_10()?,
        v1_12()?,
        v14()?,
        v14_8()?,
        v14_10()?,
        v17()?,
        v17_12()?,
        v17_13()?,
    ])
}

fn release(version: &str, summary: &'static str) -> Result<VersionStep> {
    Ok(VersionStep::new(Version::parse(version)?, summary))
}

fn v1_9() -> Result<VersionStep> {
    Ok(release("1.9", "segregation check on variants")?
        .per_tenant("ALTER TABLE `{tenant}` ADD COLUMN `check_segregation` ENUM('NOT_CHECKED','SINGLE','COSEG','CARRIERS','NO_COSEG','NO_COSEG_OTHER') NOT NULL DEFAULT 'NOT_CHECKED' COMMENT 'Segregation of the variant in the family' AFTER `check_somatic_change_username`")
        .per_tenant("ALTER TABLE `{tenant}` ADD COLUMN `check_segregation_username` VARCHAR(16) DEFAULT NULL COMMENT 'User who has set the check_segregation field.' AFTER `check_segregation`")
        .per_tenant("ALTER TABLE `{tenant}_backup_public_annotations` ADD COLUMN `check_segregation` ENUM('NOT_CHECKED','SINGLE','COSEG','CARRIERS','NO_COSEG','NO_COSEG_OTHER') NOT NULL DEFAULT 'NOT_CHECKED'")
        .per_tenant("ALTER TABLE `{tenant}_backup_public_annotations` ADD COLUMN `check_segregation_username` VARCHAR(16) DEFAULT NULL COMMENT 'User who has set the check_segregation field.' AFTER `check_segregation`")
        .sql("INSERT INTO `fields` VALUES ('check_segregation','This field can be used if this variant has been evaluated for segregation.','Highlander','user annotations','medium','CENTER')")
        .sql("INSERT INTO `fields` VALUES ('check_segregation_username','User who has set the check_segregation field.','Highlander','user annotations','small','CENTER')")
        .sql("UPDATE `fields` SET `source`='Highlander' WHERE `field`='num_genes'"))
}

fn v1_10() -> Result<VersionStep> {
    Ok(release("1.10", "dbNSFP 2.9 scores and dbSNP 141")?
        .per_tenant("ALTER TABLE `{tenant}` CHANGE `transcript_ensembl` `transcript_ensembl` CHAR(40) DEFAULT NULL COMMENT 'Ensembl ID of the canonical transcript.'")
        .per_tenant("ALTER TABLE `{tenant}` CHANGE `dbsnp_id` `dbsnp_id_137` VARCHAR(255) DEFAULT NULL COMMENT 'The dbSNP 137 rs identifier of the SNP.'")
        .per_tenant("ALTER TABLE `{tenant}` ADD COLUMN `dbsnp_id_141` VARCHAR(255) DEFAULT NULL COMMENT 'The dbSNP 141 rs identifier of the SNP, based on the position' AFTER `dbsnp_id_137`")
        .per_tenant("ALTER TABLE `{tenant}` ADD COLUMN `vest_score` DOUBLE DEFAULT NULL COMMENT 'VEST 3.0 score.'")
        .per_tenant("ALTER TABLE `{tenant}` ADD COLUMN `cadd_raw` DOUBLE DEFAULT NULL COMMENT 'CADD raw score for funtional prediction of a SNP.'")
        .per_tenant("ALTER TABLE `{tenant}` ADD COLUMN `cadd_phred` DOUBLE DEFAULT NULL COMMENT 'CADD phred-like score.'")
        .per_tenant("ALTER TABLE `{tenant}` DROP COLUMN `phylop`")
        .per_tenant("ALTER TABLE `{tenant}` ADD COLUMN `phyloP46way_primate` DOUBLE DEFAULT NULL")
        .per_tenant("ALTER TABLE `{tenant}` ADD COLUMN `phastCons46way_primate` DOUBLE DEFAULT NULL")
        .per_tenant("ALTER TABLE `{tenant}` ADD COLUMN `clinvar_rs` VARCHAR(30) DEFAULT NULL COMMENT 'rs number from the clinvar data set'")
        .per_tenant("ALTER TABLE `{tenant}` ADD COLUMN `cosmic_id` VARCHAR(20) DEFAULT NULL COMMENT 'ID of the SNV at the COSMIC database'")
        .per_tenant("ALTER TABLE `{tenant}` DROP COLUMN `exon_id`, DROP COLUMN `old_aa`, DROP COLUMN `new_aa`")
        .per_tenant("ALTER TABLE `{tenant}` CHANGE `exon_number` `exon_intron_rank` INT DEFAULT NULL")
        .sql("UPDATE `fields` SET `field`='dbsnp_id_137', `source`='dbSNP 137' WHERE `field`='dbsnp_id'")
        .sql("UPDATE `fields` SET `field`='exon_intron_rank' WHERE `field`='exon_number'")
        .sql("DELETE FROM `fields` WHERE `field` IN ('phylop','exon_id','old_aa','new_aa')"))
}

fn v1_12() -> Result<VersionStep> {
    Ok(release("1.12", "ExAC frequencies, consensus MAC/MAF and outsourcing per sample")?
        .per_tenant("ALTER TABLE `{tenant}` ADD COLUMN `exac_ac` INT DEFAULT NULL COMMENT 'Alternative allele counts (adjusted) in the ExAC database.'")
        .per_tenant("ALTER TABLE `{tenant}` ADD COLUMN `exac_af` DOUBLE DEFAULT NULL COMMENT 'Alternative allele frequency (adjusted) in the ExAC database.' AFTER `exac_ac`")
        .per_tenant("ALTER TABLE `{tenant}` ADD COLUMN `consensus_MAC` INT DEFAULT NULL COMMENT 'Sum of the alternative allele counts from population databases.'")
        .per_tenant("ALTER TABLE `{tenant}` ADD COLUMN `consensus_MAF` DOUBLE DEFAULT NULL COMMENT 'Maximum alternative allele frequency found in population databases.' AFTER `consensus_MAC`")
        .per_tenant("ALTER TABLE `{tenant}` CHANGE `outsourcing` `outsourcing` VARCHAR(50) DEFAULT NULL COMMENT 'Name of the external company where the sample has been outsourced if relevant.'")
        .custom(OutsourcingBackfill)
        .sql("INSERT INTO `fields` VALUES ('exac_ac','Alternative allele counts (adjusted) in the ExAC database.','ExAC 0.3','allele frequency in population','small','CENTER')")
        .sql("INSERT INTO `fields` VALUES ('exac_af','Alternative allele frequency (adjusted) in the ExAC database.','ExAC 0.3','allele frequency in population','small','CENTER')")
        .sql("INSERT INTO `fields` VALUES ('consensus_MAC','Sum of the alternative allele counts from population databases.','Highlander','allele frequency in population','small','CENTER')")
        .sql("INSERT INTO `fields` VALUES ('consensus_MAF','Maximum alternative allele frequency found in population databases.','Highlander','allele frequency in population','small','CENTER')")
        .sql("UPDATE `fields` SET `alignment`='LEFT', `size`='medium', `description`='Name of the exernal company where the sample has been outsourced.' WHERE `field`='outsourcing'"))
}

fn v14() -> Result<VersionStep> {
    let mut step = release("14", "single dbSNP column and enumerated user checks")?
        .per_tenant("ALTER TABLE `{tenant}` CHANGE `dbsnp_id_137` `dbsnp_id` VARCHAR(255) DEFAULT NULL COMMENT 'The dbSNP rs identifier of the SNP.'")
        .per_tenant("ALTER TABLE `{tenant}` DROP COLUMN `dbsnp_id_141`");

    // Boolean checks become enumerations; the column goes through VARCHAR
    // so the old 0/1 values can be rewritten first.
    let checks: [(&str, &str, &str, &str); 3] = [
        ("check_insilico", "OK", "NOT_OK", "'NOT_CHECKED','OK','SUSPECT','NOT_OK'"),
        ("check_validated_change", "VALIDATED", "INVALIDATED", "'NOT_CHECKED','VALIDATED','SUSPECT','INVALIDATED'"),
        ("check_somatic_change", "SOMATIC", "GERMLINE", "'NOT_CHECKED','SOMATIC','DUBIOUS','GERMLINE'"),
    ];
    for table in ["{tenant}", "{tenant}_backup_public_annotations"] {
        for (column, yes, no, values) in checks {
            step = step
                .per_tenant(format!("ALTER TABLE `{table}` CHANGE `{column}` `{column}` VARCHAR(20) DEFAULT 'NOT_CHECKED'"))
                .per_tenant(format!("UPDATE `{table}` SET `{column}` = 'NOT_CHECKED' WHERE `{column}` IS NULL"))
                .per_tenant(format!("UPDATE `{table}` SET `{column}` = '{yes}' WHERE `{column}` = '1'"))
                .per_tenant(format!("UPDATE `{table}` SET `{column}` = '{no}' WHERE `{column}` = '0'"))
                .per_tenant(format!("ALTER TABLE `{table}` CHANGE `{column}` `{column}` ENUM({values}) NOT NULL DEFAULT 'NOT_CHECKED'"));
        }
    }

    Ok(step
        .sql("UPDATE `fields` SET `field`='dbsnp_id', `source`='dbSNP' WHERE `field`='dbsnp_id_137'")
        .sql("DELETE FROM `fields` WHERE `field`='dbsnp_id_141'"))
}

fn v14_8() -> Result<VersionStep> {
    Ok(release("14.8", "DANN and Eigen scores, per-analysis statistics version")?
        .per_tenant("ALTER TABLE `{tenant}` ADD COLUMN `dann_score` DOUBLE DEFAULT NULL COMMENT 'DANN score for functional prediction of a variant.'")
        .per_tenant("ALTER TABLE `{tenant}` ADD COLUMN `eigen_score` DOUBLE DEFAULT NULL COMMENT 'Eigen is an aggregated meta-score for the functional annotation of genetic variants.'")
        .per_tenant("ALTER TABLE `{tenant}_gene_annotations` MODIFY `comments_gene` LONGTEXT NOT NULL COMMENT 'Comments about the gene, if any.'")
        .per_tenant("ALTER TABLE `{tenant}_public_annotations` MODIFY `evaluation_comments` LONGTEXT NOT NULL")
        .sql("ALTER TABLE `pathologies` DROP COLUMN `partition`")
        .sql("ALTER TABLE `projects` DROP COLUMN `partition`")
        .sql("DELETE FROM `fields` WHERE `field` = 'partition'")
        .sql("ALTER TABLE `analyses` ADD COLUMN `stats` VARCHAR(14) NOT NULL COMMENT 'Current statistics version (generated by the dbBuilder module)' AFTER `icon`")
        .sql("UPDATE `analyses` SET `stats` = '20160629000000'")
        .sql("ALTER TABLE `main` DROP COLUMN `stats`")
        .sql("INSERT INTO `fields` VALUES ('dann_score','DANN score for functional prediction of a variant.','dbNSFP 3.0','effect prediction','small','CENTER')")
        .sql("INSERT INTO `fields` VALUES ('eigen_score','Eigen is an aggregated meta-score for the functional annotation of genetic variants.','dbNSFP 3.0','effect prediction','small','CENTER')")
        .sql("DELETE FROM `users_data` WHERE `value` = 'partition'"))
}

fn v14_10() -> Result<VersionStep> {
    Ok(release("14.10", "analysis ordering, snpEff other transcripts, germline/somatic samples")?
        .sql("set session group_concat_max_len = 16384")
        .sql("ALTER TABLE `analyses` CHANGE `variant_caller` `variant_caller` ENUM('GATK', 'MUTECT', 'TORRENT', 'LIFESCOPE', 'OTHER') NOT NULL DEFAULT 'OTHER'")
        .sql("ALTER TABLE `analyses` ADD COLUMN `ordering` INT NOT NULL DEFAULT 0 COMMENT 'Ordering of the analyses icons in Highlander' AFTER `icon`")
        .per_tenant("ALTER TABLE `{tenant}` CHANGE `1000G_AC` `the1000G_AC` INT DEFAULT NULL COMMENT 'Alternative allele counts in the whole 1000 genomes phase 1 data.'")
        .per_tenant("ALTER TABLE `{tenant}` CHANGE `1000G_AF` `the1000G_AF` DOUBLE DEFAULT NULL COMMENT 'Alternative allele frequency in the whole 1000Gp1 data.'")
        .per_tenant("DROP TABLE IF EXISTS `{tenant}_other_transcripts_polyphen`")
        .per_tenant("ALTER TABLE `{tenant}` CHANGE `other_effects` `snpeff_other_transcripts` TEXT DEFAULT NULL COMMENT 'SnpEff prediction for other transcripts.'")
        .per_tenant("UPDATE `{tenant}` as a, (SELECT variant_id, group_concat(transcript_ensembl,':',snpeff_effect SEPARATOR ';') as val FROM `{tenant}_other_transcripts_snpeff` GROUP BY variant_id) as b SET a.`snpeff_other_transcripts` = b.val WHERE a.id = b.variant_id")
        .per_tenant("DROP TABLE IF EXISTS `{tenant}_other_transcripts_snpeff`")
        .per_tenant("DELETE FROM `{tenant}_possible_values` where `field` = 'other_effects'")
        .per_tenant("ALTER TABLE `{tenant}` CHANGE `sample_type` `sample_type` ENUM('Blood','Tissue','Cells','Germline','Somatic') NOT NULL DEFAULT 'Germline'")
        .per_tenant("UPDATE `{tenant}` SET `sample_type` = 'Germline' WHERE `sample_type` = 'Blood'")
        .per_tenant("UPDATE `{tenant}` SET `sample_type` = 'Somatic' WHERE `sample_type` IN ('Tissue','Cells')")
        .per_tenant("ALTER TABLE `{tenant}` CHANGE `sample_type` `sample_type` ENUM('Germline','Somatic') NOT NULL DEFAULT 'Germline' COMMENT 'Sample type (Germline or Somatic).'")
        .per_tenant("DELETE FROM `{tenant}_possible_values` where `field` = 'sample_type'")
        .per_tenant("INSERT INTO `{tenant}_possible_values` SET `field` = 'sample_type', `value` = 'Germline'")
        .per_tenant("INSERT INTO `{tenant}_possible_values` SET `field` = 'sample_type', `value` = 'Somatic'")
        .sql("UPDATE `fields` SET `field`='the1000G_AC' WHERE `field`='1000G_AC'")
        .sql("UPDATE `fields` SET `field`='the1000G_AF' WHERE `field`='1000G_AF'")
        .sql("UPDATE `fields` SET `description`='SnpEff prediction for other transcripts.', `source`='snpEff 4.1', `size`='largest', `alignment`='LEFT', `field`='snpeff_other_transcripts' WHERE `field`='other_effects'")
        .sql("UPDATE `fields` SET `description`='Sample type (Germline or Somatic).' WHERE `field`='sample_type'"))
}

fn v17() -> Result<VersionStep> {
    Ok(release("17", "split annotation tables, normal samples, harmonized names")?
        .custom(LevenshteinFunction)
        .banner("Add SV caller possibility for analyses")
        .sql("ALTER TABLE `analyses` MODIFY `variant_caller` ENUM('GATK', 'MUTECT', 'TORRENT', 'LIFESCOPE', 'SV', 'OTHER') NOT NULL DEFAULT 'OTHER'")
        .banner("Add group and active status to users")
        .sql("ALTER TABLE `users` ADD COLUMN `group` varchar(255) NOT NULL DEFAULT 'Main'")
        .sql("ALTER TABLE `users` MODIFY `rights` ENUM('user','administrator','inactive') NOT NULL DEFAULT 'user'")
        .banner("Change some field and table names, to harmonize in all Highlander")
        .sql("ALTER TABLE `analyses` CHANGE `vcf_snp_extension` `vcf_extension` VARCHAR(255) NOT NULL")
        .sql("ALTER TABLE `analyses` DROP COLUMN `vcf_indel_extension`")
        .sql("ALTER TABLE `analyses` DROP COLUMN `stats`")
        .sql("ALTER TABLE `projects` CHANGE `patient` `sample` VARCHAR(50) DEFAULT NULL COMMENT 'Sample identifier.'")
        .per_tenant("ALTER TABLE `{tenant}` CHANGE `change_type` `variant_type` ENUM('SNP','MNP','INS','DEL','SV') DEFAULT NULL")
        .per_tenant("UPDATE `{tenant}_possible_values` SET `field` = 'sample' WHERE `field` = 'patient'")
        .per_tenant("UPDATE `{tenant}_possible_values` SET `field` = 'variant_type' WHERE `field` = 'change_type'")
        .banner("Harmonize project_id field name in all tables")
        .sql("ALTER TABLE `projects` CHANGE `id` `project_id` INT(10) UNSIGNED NOT NULL AUTO_INCREMENT")
        .sql("ALTER TABLE `projects_users` CHANGE `id_project` `project_id` INT NOT NULL")
        .sql("ALTER TABLE `projects_analyses` CHANGE `id_project` `project_id` INT NOT NULL")
        .banner("Keep normal sample id in a column instead of comments")
        .sql("ALTER TABLE `projects` ADD COLUMN `normal_id` INT(10) UNSIGNED DEFAULT NULL COMMENT 'project id of the NORMAL sample for NORMAL/TUMOR pairs' AFTER `sample_type`")
        .custom(NormalSampleBackfill)
        .banner("Table users_queries and linked functionnalities are removed")
        .sql("DROP TABLE IF EXISTS `users_queries`")
        .custom(AnnotationSplit))
}

fn v17_12() -> Result<VersionStep> {
    Ok(release("17.12", "symmetric odds ratio and all snpEff effects")?
        .banner("Add new fields")
        .per_tenant("ALTER TABLE `{tenant}_sample_annotations` ADD COLUMN `symmetric_odds_ratio` DOUBLE DEFAULT NULL")
        .per_tenant("INSERT INTO `fields_analyses` VALUES ('symmetric_odds_ratio','{tenant}')")
        .per_tenant("ALTER TABLE `{tenant}_static_annotations` ADD COLUMN `snpeff_all_effects` VARCHAR(400) DEFAULT NULL, ADD INDEX `snpeff_all_effects` (`snpeff_all_effects`)")
        .per_tenant("INSERT INTO `fields_analyses` VALUES ('snpeff_all_effects','{tenant}')")
        .sql("INSERT INTO `fields` (`field`,`table`,`sql_datatype`,`description`,`source`,`category`,`size`,`alignment`) VALUES ('symmetric_odds_ratio','_sample_annotations','DOUBLE','Symmetric Odds Ratio test of strand bias.','GATK','quality','small','CENTER')")
        .sql("INSERT INTO `fields` (`field`,`table`,`sql_datatype`,`description`,`source`,`category`,`size`,`alignment`) VALUES ('snpeff_all_effects','_static_annotations','VARCHAR(400)','All effects of this variant predicted by SnpEff.','snpEff','effect prediction','large','LEFT')")
        .sql("UPDATE `fields` SET `ordering`='10' WHERE `field`='haplotype_score'")
        .sql("UPDATE `fields` SET `ordering`='3' WHERE `field`='snpeff_impact'")
        .sql("UPDATE `fields` SET `description`='Most damaging effect of this variant predicted by SnpEff.' WHERE `field`='snpeff_effect'"))
}

fn v17_13() -> Result<VersionStep> {
    Ok(release("17.13", "FastQC 0.11 columns")?
        .banner("Update FastQC columns in projects")
        .sql("ALTER TABLE `projects` CHANGE COLUMN `per_base_GC_content` `per_tile_sequence_quality` ENUM('pass', 'warn', 'fail') NULL DEFAULT NULL AFTER `per_base_sequence_quality`")
        .sql("ALTER TABLE `projects` CHANGE COLUMN `kmer_content` `adapter_content` ENUM('pass', 'warn', 'fail') NULL DEFAULT NULL")
        .sql("UPDATE `projects` SET adapter_content = NULL, per_tile_sequence_quality = NULL")
        .banner("Update consensus_prediction description")
        .sql("UPDATE `fields` SET `description`='Consensus between prediction of all available software.' WHERE `field`='consensus_prediction'"))
}
