use clap::Parser;

use netbdd::bdd::Bdd;
use netbdd::manager::BddManager;
use netbdd::pairing::Pairing;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Width of the destination field, in bits.
    #[arg(value_name = "INT", default_value = "16")]
    bits: u32,

    /// Initial node table size.
    #[clap(long, value_name = "INT", default_value = "10000")]
    nodes: usize,

    /// Initial cache size.
    #[clap(long, value_name = "INT", default_value = "1000")]
    cache: usize,

    /// Print the cache and collector statistics at the end.
    #[clap(long)]
    stats: bool,
}

/// Header bits are interleaved: bit `i` of the current header is variable
/// `2i`, the same bit after forwarding is variable `2i + 1`.
struct Header<'m> {
    mgr: &'m BddManager,
    bits: u32,
}

impl<'m> Header<'m> {
    fn current(&self, bit: u32) -> u32 {
        2 * bit
    }

    fn next(&self, bit: u32) -> u32 {
        2 * bit + 1
    }

    /// Headers whose top `len` bits equal the top `len` bits of `value`.
    fn prefix(&self, value: u64, len: u32) -> color_eyre::Result<Bdd<'m>> {
        let mut literals = Vec::new();
        for i in 0..len {
            let bit = self.bits - 1 - i;
            let var = self.current(bit);
            if value >> bit & 1 == 1 {
                literals.push(self.mgr.ith_var(var)?);
            } else {
                literals.push(self.mgr.nith_var(var)?);
            }
        }
        Ok(self.mgr.and_all(&literals)?)
    }

    /// Next bit equals current bit, for every bit in `bits`.
    fn keep(&self, bits: impl Iterator<Item = u32>) -> color_eyre::Result<Bdd<'m>> {
        let mut res = self.mgr.one();
        for bit in bits {
            let cur = self.mgr.ith_var(self.current(bit))?;
            let nxt = self.mgr.ith_var(self.next(bit))?;
            res.and_with(cur.biimp(&nxt)?)?;
        }
        Ok(res)
    }

    fn current_set(&self) -> color_eyre::Result<Bdd<'m>> {
        let vars: Vec<u32> = (0..self.bits).map(|b| self.current(b)).collect();
        Ok(self.mgr.make_set(&vars)?)
    }

    fn next_to_current(&self) -> color_eyre::Result<Pairing<'m>> {
        let pairs: Vec<(u32, u32)> = (0..self.bits).map(|b| (self.next(b), self.current(b))).collect();
        Ok(self.mgr.make_pair_from(&pairs)?)
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);
    if args.bits < 4 || args.bits > 48 {
        color_eyre::eyre::bail!("bits must be in 4..=48, got {}", args.bits);
    }

    let mgr = BddManager::init(args.nodes, args.cache);
    mgr.set_var_num(2 * args.bits)?;
    println!("mgr = {:?}", mgr);

    let h = Header {
        mgr: &mgr,
        bits: args.bits,
    };
    let top = args.bits - 1;

    // ACL: drop 10*, accept everything else.
    let denied = h.prefix(0b10u64 << (top - 1), 2)?;
    let acl = denied.not()?;

    // Forwarding step: headers starting with 1 get their top bit cleared,
    // headers starting with 01 get their second bit cleared, others are kept.
    let hi = mgr.ith_var(h.current(top))?;
    let second = mgr.ith_var(h.current(top - 1))?;
    let rewrite_top = hi
        .and(&mgr.nith_var(h.next(top))?)?
        .and(&h.keep(0..top)?)?;
    let rewrite_second = hi
        .not()?
        .and(&second)?
        .and(&mgr.nith_var(h.next(top))?)?
        .and(&mgr.nith_var(h.next(top - 1))?)?
        .and(&h.keep(0..top - 1)?)?;
    let identity = hi.not()?.and(&second.not()?)?.and(&h.keep(0..args.bits)?)?;
    let step = mgr.or_all(&[rewrite_top, rewrite_second, identity])?;
    let rel = step.and(&acl)?;
    println!("relation: {} nodes, {} paths", rel.node_count()?, rel.path_count()?);

    let current = h.current_set()?;
    let pair = h.next_to_current()?;
    println!("pairing valid for transform: {}", pair.is_valid_for_transform()?);

    // Start from every header in 11*.
    let mut reached = h.prefix(0b11u64 << (top - 1), 2)?;
    let mut frontier = reached.clone();
    let mut rounds = 0;
    while !frontier.is_zero() {
        rounds += 1;
        let image = frontier.rel_prod(&rel, &current)?.replace(&pair)?;
        let shifted = frontier.transform(&rel, &pair)?;
        color_eyre::eyre::ensure!(image == shifted, "transform disagrees with rel_prod in round {}", rounds);
        frontier = image.diff(&reached)?;
        reached.or_with(frontier.clone())?;
        println!(
            "round {}: frontier {} headers, reached {} headers ({} nodes)",
            rounds,
            frontier.sat_count()? >> args.bits,
            reached.sat_count()? >> args.bits,
            reached.node_count()?
        );
    }

    // The next-state bits are free in `reached`, so every count above is
    // shifted down by their number.
    let next_vars: Vec<u32> = (0..args.bits).map(|b| h.next(b)).collect();
    let headers = reached.exist(&mgr.make_set(&next_vars)?)?;
    println!("reachable headers: {}", headers.sat_count()? >> args.bits);
    println!("nodes per variable: {:?}", headers.var_profile()?);
    println!("example header: {:?}", headers.sat_one()?.min_assignment_bits()?);

    drop((frontier, reached, headers));
    mgr.collect_garbage();
    println!("mgr = {:?}", mgr);
    println!("handles: made {}, freed {}", mgr.made_bdds(), mgr.freed_bdds());
    if args.stats {
        mgr.print_stat();
    }

    let time_total = time_total.elapsed();
    println!("\nAll done in {:.2} s", time_total.as_secs_f64());

    Ok(())
}
