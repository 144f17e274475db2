extern crate assert_cli;

#[cfg(test)]
mod tests {
    use assert_cli::Assert;

    const BIN_ARGS: &[&str] = &[
        "bin",
        "--reference-genomes",
        "tests/data/bins/reference_genomes.tsv",
        "--blast-directory",
        "tests/data/bins/blast",
        "--coverage",
        "tests/data/bins/coverage.tsv",
        "--contig-fasta",
        "tests/data/bins/contigs.fna",
        "--roles",
        "tests/data/bins/roles.tsv",
    ];

    #[test]
    fn test_bin_hello_world() {
        Assert::main_binary()
            .with_args(BIN_ARGS)
            .succeeds()
            .stdout()
            .contains(
                "c3\n\
                 98.00\t1280.100\tStaphylococcus aureus\n\
                 \n\
                 1\tLSU ribosomal protein L2p\n\
                 1\tPhenylalanyl-tRNA synthetase alpha chain\n\
                 1\tSSU ribosomal protein S8p\n\
                 //\n\
                 c4\n\
                 97.00\t1280.100\tStaphylococcus aureus\n\
                 \n\
                 1\tLSU ribosomal protein L2p\n\
                 1\tPhenylalanyl-tRNA synthetase alpha chain\n\
                 1\tSSU ribosomal protein S8p\n\
                 //\n\
                 c1\n\
                 95.00\t83333.1\tEscherichia coli K-12\n\
                 90.00\t562.77\tEscherichia coli O157:H7\n\
                 \n\
                 c2\n\
                 94.00\t83333.1\tEscherichia coli K-12\n\
                 91.00\t562.77\tEscherichia coli O157:H7\n\
                 \n\
                 1\tLSU ribosomal protein L2p\n\
                 1\tPhenylalanyl-tRNA synthetase alpha chain\n\
                 //\n\
                 c5\n\
                 93.00\t83333.1\tEscherichia coli K-12\n\
                 92.00\t562.77\tEscherichia coli O157:H7\n\
                 \n\
                 //\n",
            )
            .unwrap();
    }

    #[test]
    fn test_bin_merge_log_validates() {
        let td = tempfile::TempDir::new().unwrap();
        let merge_log = td.path().join("merges.tsv");
        let bins = td.path().join("bins.txt");
        let mut args = BIN_ARGS.to_vec();
        args.extend(&[
            "--output-merge-log",
            merge_log.to_str().unwrap(),
            "--output-bins",
            bins.to_str().unwrap(),
        ]);
        Assert::main_binary()
            .with_args(&args)
            .succeeds()
            .stdout()
            .is("")
            .unwrap();
        assert_eq!(
            std::fs::read_to_string("tests/data/bins/merge_log.tsv").unwrap(),
            std::fs::read_to_string(&merge_log).unwrap()
        );
        assert!(std::fs::read_to_string(&bins)
            .unwrap()
            .starts_with("c3\n98.00\t1280.100\tStaphylococcus aureus\n"));

        Assert::main_binary()
            .with_args(&["bin-validate", "--merge-log", merge_log.to_str().unwrap()])
            .succeeds()
            .unwrap();

        Assert::main_binary()
            .with_args(&[
                "bin-validate",
                "--merge-log",
                merge_log.to_str().unwrap(),
                "--coverage",
                "tests/data/bins/coverage.tsv",
                "--contig-fasta",
                "tests/data/bins/contigs.fna",
                "--roles",
                "tests/data/bins/roles.tsv",
            ])
            .succeeds()
            .unwrap();
    }

    #[test]
    fn test_bin_validate_recomputes_roles() {
        Assert::main_binary()
            .with_args(&[
                "bin-validate",
                "--merge-log",
                "tests/data/bins/merge_log.tsv",
                "--roles",
                "tests/data/bins/other_roles.tsv",
            ])
            .fails()
            .stderr()
            .contains("3 roles in common for c3 and c4, but their bins have 1")
            .unwrap();
    }

    #[test]
    fn test_bin_strict_coverage_ratio() {
        let mut args = BIN_ARGS.to_vec();
        args.extend(&["--coverage-ratio", "1.1"]);
        Assert::main_binary()
            .with_args(&args)
            .succeeds()
            .stdout()
            .contains("//\nc1\n95.00\t83333.1\tEscherichia coli K-12\n90.00\t562.77\tEscherichia coli O157:H7\n\n1\tPhenylalanyl-tRNA synthetase alpha chain\n//\n")
            .unwrap();
    }

    #[test]
    fn test_bin_missing_blast_file() {
        let mut args = BIN_ARGS.to_vec();
        args.extend(&["--blast-type", "blastp"]);
        Assert::main_binary()
            .with_args(&args)
            .fails()
            .stderr()
            .contains("83333.1.blastp")
            .unwrap();
    }

    #[test]
    fn test_bin_validate_violation() {
        Assert::main_binary()
            .with_args(&[
                "bin-validate",
                "--merge-log",
                "tests/data/bins/bad_merge_log.tsv",
            ])
            .fails()
            .stderr()
            .contains("3 roles in common")
            .unwrap();
    }

    #[test]
    fn test_bin_validate_stricter_limit() {
        Assert::main_binary()
            .with_args(&[
                "bin-validate",
                "--merge-log",
                "tests/data/bins/merge_log.tsv",
                "--coverage-ratio",
                "1.1",
            ])
            .fails()
            .unwrap();
    }

    #[test]
    fn test_rep_server_lookups() {
        Assert::main_binary()
            .with_args(&["rep-server", "--index-directory", "tests/data/index"])
            .stdin("id_to_index 562.77\nindex_to_id 4\nname 1396.5\nname 9.9\n")
            .succeeds()
            .stdout()
            .contains(
                "562.77\t2\n\
                 \n\
                 4\t287.1\n\
                 \n\
                 1396.5\tBacillus cereus\n\
                 \n\
                 9.9\tnot found\n\
                 \n",
            )
            .unwrap();
    }

    #[test]
    fn test_rep_server_rep_sets() {
        Assert::main_binary()
            .with_args(&["rep-server", "--index-directory", "tests/data/index"])
            .stdin("rep_set 100 562.77\nn_reps 3\nthin_set 10 3,1,0,4\nclosest_N_genomes 0 1\n")
            .succeeds()
            .stdout()
            .contains(
                "2\t562.77\tEscherichia coli O157:H7\n\
                 1\t1280.100\tStaphylococcus aureus\n\
                 3\t1396.5\tBacillus cereus\n\
                 4\t287.1\tPseudomonas aeruginosa\n\
                 \n\
                 threshold\t20\n\
                 0\t83333.1\tEscherichia coli K-12\n\
                 1\t1280.100\tStaphylococcus aureus\n\
                 \n\
                 3\t1396.5\n\
                 0\t83333.1\n\
                 \n\
                 150\t2\t562.77\tEscherichia coli O157:H7\n\
                 \n",
            )
            .unwrap();
    }

    #[test]
    fn test_rep_server_find_sigs_and_bad_request() {
        Assert::main_binary()
            .with_args(&["rep-server", "--index-directory", "tests/data/index"])
            .stdin("find_sigs tests/data/index/query.fna\nfly_to_moon\n")
            .succeeds()
            .stdout()
            .contains(
                "75.00\t3\t83333.1\tEscherichia coli K-12\n\
                 50.00\t1\t1280.100\tStaphylococcus aureus\n\
                 \n\
                 unrecognised request: fly_to_moon\n\
                 supported requests:\n",
            )
            .unwrap();
    }

    #[test]
    fn test_rep_server_missing_index() {
        Assert::main_binary()
            .with_args(&["rep-server", "--index-directory", "tests/data/bins"])
            .fails()
            .stderr()
            .contains("genomes.index")
            .unwrap();
    }
}
