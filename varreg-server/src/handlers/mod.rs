pub mod annotations;
pub mod info;
pub mod mappings;
pub mod search;
pub mod sequence;
pub mod variation;
pub mod vcf;
